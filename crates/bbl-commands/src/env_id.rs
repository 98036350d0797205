use std::sync::Arc;

use bbl_domain::{validate_env_name, State};
use bbl_driver::EnvironmentLookup;
use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::CommandError;

const LAKES: &[&str] = &[
    "superior", "michigan", "huron", "erie", "ontario", "tahoe", "baikal", "titicaca", "victoria",
    "tanganyika", "malawi", "ladoga", "onega", "vostok", "geneva", "constance", "como", "garda",
    "crater", "champlain", "winnipeg", "athabasca", "nicaragua", "balaton", "bled", "ohrid",
];

const GENERATE_ATTEMPTS: usize = 5;

/// Names a new environment and keeps the name of an existing one.
pub struct EnvIdManager {
    lookup: Arc<dyn EnvironmentLookup>,
}

impl EnvIdManager {
    pub fn new(lookup: Arc<dyn EnvironmentLookup>) -> Self {
        EnvIdManager { lookup }
    }

    pub async fn sync(&self, mut state: State, name: &str) -> Result<State, CommandError> {
        if !state.env_id.is_empty() {
            return Ok(state);
        }

        state.env_id = if name.is_empty() {
            self.generate().await?
        } else {
            validate_env_name(name)?;
            if self.lookup.environment_exists(name).await? {
                return Err(CommandError::Usage(format!(
                    "It looks like a bbl environment already exists with the name '{name}'. Please provide a different name."
                )));
            }
            name.to_string()
        };
        info!(env_id = %state.env_id, "environment named");

        state.jumpbox.enabled = true;
        Ok(state)
    }

    async fn generate(&self) -> Result<String, CommandError> {
        for _ in 0..GENERATE_ATTEMPTS {
            let candidate = generated_name(pick_lake(), Utc::now());
            if !self.lookup.environment_exists(&candidate).await? {
                return Ok(candidate);
            }
            debug!(%candidate, "generated name is taken");
        }
        Err(CommandError::Usage("could not generate an unused environment name, please pass --name".into()))
    }
}

fn pick_lake() -> &'static str {
    let index = Uuid::new_v4().as_u128() % LAKES.len() as u128;
    LAKES[index as usize]
}

fn generated_name(lake: &str, now: DateTime<Utc>) -> String {
    format!("bbl-env-{lake}-{}", now.format("%Y-%m-%dt%H-%Mz"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bbl_driver::DriverError;
    use chrono::TimeZone;

    struct Taken(&'static [&'static str]);

    #[async_trait]
    impl EnvironmentLookup for Taken {
        async fn environment_exists(&self, name: &str) -> Result<bool, DriverError> {
            Ok(self.0.contains(&name))
        }
    }

    fn manager(taken: &'static [&'static str]) -> EnvIdManager {
        EnvIdManager::new(Arc::new(Taken(taken)))
    }

    #[test]
    fn generated_names_carry_lake_and_minute() {
        let now = Utc.with_ymd_and_hms(2017, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(generated_name("erie", now), "bbl-env-erie-2017-03-04t05-06z");
    }

    #[tokio::test]
    async fn existing_id_is_kept() {
        let state = State { env_id: "kept".into(), ..State::default() };
        let synced = manager(&[]).sync(state, "other").await.unwrap();
        assert_eq!(synced.env_id, "kept");
        assert!(!synced.jumpbox.enabled);
    }

    #[tokio::test]
    async fn given_name_enables_jumpbox() {
        let synced = manager(&[]).sync(State::default(), "my-env").await.unwrap();
        assert_eq!(synced.env_id, "my-env");
        assert!(synced.jumpbox.enabled);
    }

    #[tokio::test]
    async fn invalid_and_taken_names_are_rejected() {
        let m = manager(&["taken"]);
        assert!(matches!(m.sync(State::default(), "Bad_Name").await, Err(CommandError::Domain(_))));
        let err = m.sync(State::default(), "taken").await.unwrap_err();
        assert!(err.to_string().contains("already exists with the name 'taken'"));
    }

    #[tokio::test]
    async fn generated_when_no_name() {
        let synced = manager(&[]).sync(State::default(), "").await.unwrap();
        assert!(synced.env_id.starts_with("bbl-env-"));
        validate_env_name(&synced.env_id).unwrap();
    }
}

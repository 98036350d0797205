use std::collections::BTreeMap;

use async_trait::async_trait;
use bbl_domain::{Iaas, Lb, LbType, State};
use bbl_driver::Outputs;
use bbl_validate::StateValidator;
use serde_json::Value;
use tracing::info;

use crate::command::Command;
use crate::error::{step, CommandError};
use crate::lb_args::{LbArgs, LbArgsHandler};
use crate::managers::Managers;

/// Terraform apply for an LB change, saving state the same way `up` does.
async fn apply_lb_change(m: &Managers, state: State) -> Result<State, CommandError> {
    m.terraform.setup(&state).await.map_err(step("Terraform manager setup"))?;
    info!("step: applying terraform template");
    let applied = match m.terraform.apply(state.clone()).await {
        Ok(applied) => applied,
        Err(e) => return Err(m.persist_on_failure(&state, e).await),
    };
    m.store.set(&applied).await?;
    Ok(applied)
}

fn require_state(m: &Managers) -> Result<(), CommandError> {
    StateValidator::new(m.store.paths().clone()).validate()?;
    Ok(())
}

// ── create-lbs ────────────────────────────────────────────────────────────────

pub struct CreateLbs {
    managers: Managers,
    lb_args: LbArgsHandler,
}

impl CreateLbs {
    pub fn new(managers: Managers) -> Self {
        CreateLbs { managers, lb_args: LbArgsHandler::new() }
    }
}

#[async_trait]
impl Command for CreateLbs {
    type Args = LbArgs;

    async fn check_fast_fails(&self, args: &LbArgs, state: &State) -> Result<(), CommandError> {
        require_state(&self.managers)?;
        if args.is_empty() {
            return Err(CommandError::Usage("--type is required".into()));
        }
        self.lb_args.get_lb_state(state.iaas, args)?;
        Ok(())
    }

    async fn execute(&self, args: LbArgs, mut state: State) -> Result<(), CommandError> {
        let m = &self.managers;
        m.validate_environment(&state).await?;

        let lb = self.lb_args.get_lb_state(state.iaas, &args)?;
        state.lb = lb.merged_with(&state.lb);
        m.store.set(&state).await?;

        let state = apply_lb_change(m, state).await?;
        if state.has_director() {
            info!("step: updating cloud config");
            m.cloud_config.update(&state).await.map_err(step("Cloud config manager update"))?;
        }
        Ok(())
    }
}

// ── delete-lbs ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteLbsArgs {
    pub skip_if_missing: bool,
}

pub struct DeleteLbs {
    managers: Managers,
}

impl DeleteLbs {
    pub fn new(managers: Managers) -> Self {
        DeleteLbs { managers }
    }
}

#[async_trait]
impl Command for DeleteLbs {
    type Args = DeleteLbsArgs;

    async fn check_fast_fails(&self, args: &DeleteLbsArgs, state: &State) -> Result<(), CommandError> {
        require_state(&self.managers)?;
        if state.lb.is_empty() {
            if args.skip_if_missing {
                info!("no lb type exists, skipping...");
                return Err(CommandError::ExitSuccessfully);
            }
            return Err(CommandError::Usage("Environment does not have load balancers to delete.".into()));
        }
        Ok(())
    }

    async fn execute(&self, _args: DeleteLbsArgs, mut state: State) -> Result<(), CommandError> {
        let m = &self.managers;
        m.validate_environment(&state).await?;

        state.lb = Lb::default();
        if state.has_director() {
            info!("step: updating cloud config");
            m.cloud_config.update(&state).await.map_err(step("Cloud config manager update"))?;
        }
        apply_lb_change(m, state).await?;
        Ok(())
    }
}

// ── lbs ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct LbsArgs {
    pub json: bool,
}

/// Prints the load balancers terraform created.
pub struct Lbs {
    managers: Managers,
}

impl Lbs {
    pub fn new(managers: Managers) -> Self {
        Lbs { managers }
    }
}

/// `(label, output key)` pairs for one iaas and LB type.
fn lb_outputs(iaas: Iaas, lb_type: LbType) -> &'static [(&'static str, &'static str)] {
    match (iaas, lb_type) {
        (Iaas::Aws, LbType::Cf) => &[
            ("CF Router LB", "cf_router_lb_name"),
            ("CF Router LB URL", "cf_router_lb_url"),
            ("CF SSH Proxy LB", "cf_ssh_lb_name"),
            ("CF SSH Proxy LB URL", "cf_ssh_lb_url"),
            ("CF TCP Router LB", "cf_tcp_lb_name"),
            ("CF TCP Router LB URL", "cf_tcp_lb_url"),
        ],
        (Iaas::Aws, LbType::Concourse) => &[
            ("Concourse LB", "concourse_lb_name"),
            ("Concourse LB URL", "concourse_lb_url"),
        ],
        (Iaas::Gcp, LbType::Cf) => &[
            ("CF Router LB", "router_lb_ip"),
            ("CF SSH Proxy LB", "ssh_proxy_lb_ip"),
            ("CF TCP Router LB", "tcp_router_lb_ip"),
            ("CF WebSocket LB", "ws_lb_ip"),
        ],
        (Iaas::Gcp, LbType::Concourse) => &[("Concourse LB", "concourse_lb_ip")],
        (Iaas::Azure, LbType::Cf) => &[("CF App Gateway", "cf_app_gateway_name")],
        (Iaas::Azure, LbType::Concourse) => &[
            ("Concourse LB", "concourse_lb_name"),
            ("Concourse LB IP", "concourse_lb_ip"),
        ],
        (Iaas::Vsphere, _) => &[],
    }
}

fn dns_servers_key(iaas: Iaas) -> &'static str {
    match iaas {
        Iaas::Gcp => "system_domain_dns_servers",
        _ => "env_dns_zone_name_servers",
    }
}

/// Rendered LB lines, or the same content as a JSON object.
pub fn render_lbs(state: &State, outputs: &Outputs, json: bool) -> Result<String, CommandError> {
    let (Some(iaas), Some(lb_type)) = (state.iaas, state.lb.lb_type) else {
        return Err(CommandError::Usage("no lbs found".into()));
    };

    let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
    let mut lines = Vec::new();
    for &(label, key) in lb_outputs(iaas, lb_type) {
        let value = outputs.get_string(key)?;
        lines.push(format!("{label}: {value}"));
        fields.insert(key, Value::String(value));
    }
    if lb_type == LbType::Cf && !state.lb.domain.is_empty() {
        let servers = outputs.get_string_slice(dns_servers_key(iaas))?;
        lines.push(format!("CF System Domain DNS servers: {}", servers.join(" ")));
        fields.insert(dns_servers_key(iaas), servers.into());
    }

    if json {
        serde_json::to_string_pretty(&fields)
            .map_err(|e| CommandError::Usage(format!("render lbs: {e}")))
    } else {
        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl Command for Lbs {
    type Args = LbsArgs;

    async fn check_fast_fails(&self, _args: &LbsArgs, _state: &State) -> Result<(), CommandError> {
        require_state(&self.managers)
    }

    async fn execute(&self, args: LbsArgs, state: State) -> Result<(), CommandError> {
        let m = &self.managers;
        m.terraform.setup(&state).await.map_err(step("Terraform manager setup"))?;
        let outputs = m.terraform.get_outputs().await.map_err(step("Terraform manager get outputs"))?;
        m.output.print(&render_lbs(&state, &outputs, args.json)?);
        Ok(())
    }
}

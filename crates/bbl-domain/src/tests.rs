#[cfg(test)]
mod tests {
    use crate::types::*;
    use crate::DomainError;

    fn populated_state() -> State {
        let mut state = State {
            version: STATE_VERSION,
            bbl_version: "v0.1.0".into(),
            iaas: Some(Iaas::Gcp),
            env_id: "some-env".into(),
            tf_state: "{\"version\": 4}".into(),
            latest_tf_output: "Apply complete!".into(),
            ..State::default()
        };
        state.gcp.region = "us-west1".into();
        state.gcp.zones = vec!["us-west1-a".into(), "us-west1-b".into()];
        state.jumpbox.enabled = true;
        state.jumpbox.url = "35.1.2.3:22".into();
        state.jumpbox.state.insert("current_vm_cid".into(), "vm-123".into());
        state.bosh.director_name = "bosh-some-env".into();
        state.bosh.state.insert("director_id".into(), "abc".into());
        state.lb = Lb {
            lb_type: Some(LbType::Cf),
            cert: "cert".into(),
            key: "key".into(),
            chain: String::new(),
            domain: "cf.example.com".into(),
        };
        state
    }

    #[test]
    fn serialized_state_reserializes_identically() {
        let blob = serde_json::to_string_pretty(&populated_state()).unwrap();
        let parsed: State = serde_json::from_str(&blob).unwrap();
        assert_eq!(serde_json::to_string_pretty(&parsed).unwrap(), blob);
    }

    #[test]
    fn on_disk_key_names() {
        let value = serde_json::to_value(populated_state()).unwrap();
        assert_eq!(value["envID"], "some-env");
        assert_eq!(value["bblVersion"], "v0.1.0");
        assert_eq!(value["iaas"], "gcp");
        assert_eq!(value["lb"]["type"], "cf");
        assert_eq!(value["latestTFOutput"], "Apply complete!");
        assert_eq!(value["tfState"], "{\"version\": 4}");
        assert_eq!(value["gcp"]["projectID"], "");
        assert!(value["bosh"].get("directorSSLCA").is_some());
    }

    #[test]
    fn blank_iaas_and_lb_type_parse_as_none() {
        let state: State =
            serde_json::from_str(r#"{"version": 14, "iaas": "", "lb": {"type": ""}}"#).unwrap();
        assert_eq!(state.iaas, None);
        assert!(state.lb.is_empty());
        assert_eq!(state.env_id, "");
    }

    #[test]
    fn unknown_iaas_is_rejected() {
        let err = serde_json::from_str::<State>(r#"{"iaas": "openstack"}"#).unwrap_err();
        assert!(err.to_string().contains("\"openstack\" is not a valid iaas"));
    }

    #[test]
    fn default_state_is_empty() {
        assert!(State::default().is_empty());
        assert!(!populated_state().is_empty());
    }

    #[test]
    fn initialized_version_threshold() {
        let mut state = State { version: 12, bbl_version: "v1".into(), ..State::default() };
        assert!(!state.has_initialized_version());
        state.version = INITIALIZED_VERSION;
        assert!(state.has_initialized_version());
        state.bbl_version.clear();
        assert!(!state.has_initialized_version());
    }

    #[test]
    fn region_follows_iaas() {
        let mut state = State { iaas: Some(Iaas::Aws), ..State::default() };
        state.aws.region = "eu-west-1".into();
        state.gcp.region = "us-west1".into();
        assert_eq!(state.region(), "eu-west-1");
        state.iaas = Some(Iaas::Vsphere);
        assert_eq!(state.region(), "");
    }

    #[test]
    fn lb_merge_inherits_empty_fields_from_existing_lb() {
        let old = Lb {
            lb_type: Some(LbType::Cf),
            cert: "old-cert".into(),
            key: "old-key".into(),
            chain: "old-chain".into(),
            domain: "old.example.com".into(),
        };
        let new = Lb { cert: "new-cert".into(), ..Lb::default() };

        let merged = new.merged_with(&old);
        assert_eq!(merged.lb_type, Some(LbType::Cf));
        assert_eq!(merged.cert, "new-cert");
        assert_eq!(merged.key, "old-key");
        assert_eq!(merged.domain, "old.example.com");
    }

    #[test]
    fn lb_merge_to_concourse_drops_domain() {
        let old = Lb {
            lb_type: Some(LbType::Cf),
            cert: "old-cert".into(),
            key: "old-key".into(),
            domain: "old.example.com".into(),
            ..Lb::default()
        };
        let new = Lb { lb_type: Some(LbType::Concourse), ..Lb::default() };

        let merged = new.merged_with(&old);
        assert_eq!(merged.lb_type, Some(LbType::Concourse));
        assert_eq!(merged.cert, "old-cert");
        assert!(merged.domain.is_empty());
    }

    #[test]
    fn lb_merge_is_idempotent() {
        let old = Lb {
            lb_type: Some(LbType::Concourse),
            cert: "c".into(),
            key: "k".into(),
            ..Lb::default()
        };
        let new = Lb { chain: "chain".into(), ..Lb::default() };
        let once = new.merged_with(&old);
        let twice = once.clone().merged_with(&old);
        assert_eq!(once, twice);
    }

    #[test]
    fn lb_merge_without_existing_lb_keeps_new() {
        let new = Lb { lb_type: Some(LbType::Concourse), ..Lb::default() };
        assert_eq!(new.clone().merged_with(&Lb::default()), new);
    }

    #[test]
    fn jumpbox_host_strips_port() {
        let jumpbox = Jumpbox { url: "10.0.0.5:22".into(), ..Jumpbox::default() };
        assert_eq!(jumpbox.host(), "10.0.0.5");
        assert!(jumpbox.is_deployed());
    }

    #[test]
    fn director_name_defaults_from_env_id() {
        let mut state = State { env_id: "lake".into(), ..State::default() };
        assert_eq!(state.director_name(), "bosh-lake");
        state.bosh.director_name = "custom".into();
        assert_eq!(state.director_name(), "custom");
    }

    #[test]
    fn env_name_rules() {
        assert!(validate_env_name("my-env-1").is_ok());
        assert!(validate_env_name("a").is_ok());
        for bad in ["", "1env", "env-", "Env", "my_env"] {
            assert_eq!(
                validate_env_name(bad),
                Err(DomainError::InvalidEnvName(bad.to_string()))
            );
        }
    }

    #[test]
    fn lb_type_parse_error_message() {
        let err = "nginx".parse::<LbType>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "\"nginx\" is not a valid lb type, valid lb types are: concourse, cf"
        );
    }
}

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bbl_domain::{Iaas, Lb, LbType};
use bbl_validate::CertificateValidator;

use crate::error::CommandError;

/// Load balancer flags as typed; cert, key and chain are file paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LbArgs {
    pub lb_type: String,
    pub cert_path: String,
    pub key_path: String,
    pub chain_path: String,
    pub domain: String,
}

impl LbArgs {
    pub fn is_empty(&self) -> bool {
        self.lb_type.is_empty()
    }
}

/// Turns LB flags into the `lb` record for one iaas.
#[derive(Debug, Clone, Copy, Default)]
pub struct LbArgsHandler {
    certificates: CertificateValidator,
}

impl LbArgsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_lb_state(&self, iaas: Option<Iaas>, args: &LbArgs) -> Result<Lb, CommandError> {
        let lb_type: LbType = args.lb_type.parse()?;
        if lb_type == LbType::Concourse && !args.domain.is_empty() {
            return Err(CommandError::Usage(
                "domain is not implemented for concourse load balancers. Remove the --lb-domain flag and try again."
                    .into(),
            ));
        }

        let mut lb = Lb { lb_type: Some(lb_type), domain: args.domain.clone(), ..Lb::default() };
        match (iaas, lb_type) {
            (None, _) => return Err(CommandError::Usage("--iaas is required to configure a load balancer".into())),
            (Some(Iaas::Vsphere), _) => {
                return Err(CommandError::Usage("load balancers are not supported on vSphere".into()));
            }
            (Some(Iaas::Gcp), LbType::Concourse) => {}
            (Some(Iaas::Azure), LbType::Cf) => {
                let pkcs12 = self.certificates.validate_pkcs12(&args.cert_path, &args.key_path)?;
                lb.cert = STANDARD.encode(&pkcs12.bundle);
                lb.key = pkcs12.password;
            }
            _ => {
                let chain = Some(args.chain_path.as_str()).filter(|p| !p.is_empty());
                let data = self.certificates.validate(&args.cert_path, &args.key_path, chain)?;
                lb.cert = data.cert;
                lb.key = data.key;
                lb.chain = data.chain;
            }
        }
        Ok(lb)
    }
}

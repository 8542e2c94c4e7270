pub mod credentials;
pub mod netrc;

pub use credentials::{CredentialProvisioner, RoleAssumer, SessionCredentials, StsRoleAssumer};
pub use netrc::write_netrc;

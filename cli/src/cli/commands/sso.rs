//! Single sign-on command handler.

use crate::config::AuthConfig;
use crate::error::Result;
use crate::sso::SamlBridge;

/// Handle the `campus-auth sso` command.
///
/// The first failure is returned as is; the recovered token is the only thing
/// written to stdout.
pub async fn handle_sso(config: &AuthConfig, username: &str, password: &str) -> Result<()> {
    let bridge = SamlBridge::new(config.sso.clone(), config.http.clone());
    let token = bridge.recover_token(username, password).await?;

    println!("{}", token.token);
    Ok(())
}

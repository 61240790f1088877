use std::net::SocketAddr;

use chatkit_exchange::{ExchangeConfig, SessionConfigSetting};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "chatkit-session-server",
    version,
    about = "Serves the ChatKit credential exchange endpoint"
)]
pub struct ServerArgs {
    /// Socket address to listen on.
    #[arg(long, env = "CHATKIT_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub exchange: ExchangeConfig,
}

impl ServerConfig {
    pub fn load() -> Self {
        let args = ServerArgs::parse();
        Self {
            addr: args.bind,
            exchange: ExchangeConfig::from_env(),
        }
    }

    /// Startup warnings for settings that will make every exchange fail.
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.exchange.api_key().is_none() {
            warnings.push("OPENAI_API_KEY not set; session requests will fail");
        }
        match self.exchange.session_config() {
            SessionConfigSetting::Missing => {
                warnings.push("CHATKIT_SESSION_CONFIG not set; session requests will fail")
            }
            SessionConfigSetting::Invalid(_) => warnings
                .push("CHATKIT_SESSION_CONFIG is not valid JSON; session requests will fail"),
            SessionConfigSetting::Valid(_) => {}
        }
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bind_flag() {
        let args = ServerArgs::parse_from(["chatkit-session-server", "--bind", "127.0.0.1:9000"]);
        assert_eq!(args.bind, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn warns_for_each_missing_setting() {
        let config = ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            exchange: ExchangeConfig::new(None, SessionConfigSetting::Missing),
        };
        assert_eq!(config.warnings().len(), 2);

        let config = ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            exchange: ExchangeConfig::new(
                Some("sk".into()),
                SessionConfigSetting::Valid(json!({})),
            ),
        };
        assert!(config.warnings().is_empty());
    }
}

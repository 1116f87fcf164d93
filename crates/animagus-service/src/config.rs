//! Service listen configuration, following `causality-api::config::ApiConfig`'s
//! plain-struct-with-`Default` style.

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

impl ServiceConfig {
    pub fn socket_addr(&self) -> std::net::SocketAddr {
        format!("{}:{}", self.host, self.port)
            .parse()
            .unwrap_or_else(|e| panic!("invalid listen address {}:{}: {e}", self.host, self.port))
    }
}

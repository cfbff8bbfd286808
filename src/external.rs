//! Job-execution (FME) service seam.
//!
//! The service itself lives on the network; the repositories only need the two
//! capability checks below. Either check failing, or returning `false`, fails
//! the whole operation with [`SapError::ExternalService`].
//!
//! With the `fme-http` feature, [`HttpJobService`] talks to the FME manager's
//! REST API.

use anyhow::Result;
use serde::Serialize;
use crate::error::SapError;

#[cfg(feature = "fme-http")]
pub use http::HttpJobService;

/// Routine reference submitted for parameter validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineRef {
    pub fme_server_id: i64,
    pub routine: String,
}

pub trait JobService {
    /// Health probe for a server before it is registered or updated
    fn check_connection(&self, server: &str, port: u16) -> Result<bool>;

    /// Whether the routines expose the parameters the pipeline passes them
    fn validate_routine_parameters(&self, routines: &[RoutineRef]) -> Result<bool>;
}

pub(crate) fn ensure_connection<S: JobService + ?Sized>(service: &S, server: &str, port: u16) -> Result<()> {
    match service.check_connection(server, port) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SapError::ExternalService(format!(
            "Could not connect to FME server {}:{}",
            server, port
        ))
        .into()),
        Err(e) => Err(SapError::ExternalService(format!(
            "Error communicating with FME server {}:{}: {}",
            server, port, e
        ))
        .into()),
    }
}

pub(crate) fn ensure_routines_valid<S: JobService + ?Sized>(service: &S, routines: &[RoutineRef]) -> Result<()> {
    match service.validate_routine_parameters(routines) {
        Ok(true) => Ok(()),
        Ok(false) => Err(SapError::ExternalService(
            "The routine does not expose parameters compatible with the production pipeline".to_string(),
        )
        .into()),
        Err(e) => Err(SapError::ExternalService(format!(
            "Error validating routine parameters: {}",
            e
        ))
        .into()),
    }
}

#[cfg(feature = "fme-http")]
mod http {
    use super::{JobService, RoutineRef};
    use crate::models::FmeServer;
    use anyhow::{anyhow, Context, Result};
    use serde::Deserialize;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Parameters the pipeline passes to every routine it runs
    const PIPELINE_PARAMETERS: [&str; 3] = ["dbname", "dbhost", "dbport"];

    #[derive(Deserialize)]
    struct RoutineResponse {
        dados: RoutineDetails,
    }

    #[derive(Deserialize)]
    struct RoutineDetails {
        #[serde(default)]
        parametros: Vec<String>,
    }

    /// FME manager client over HTTP
    ///
    /// Routine checks resolve `fme_server_id` against the servers given at
    /// construction.
    pub struct HttpJobService {
        agent: ureq::Agent,
        servers: HashMap<i64, String>,
    }

    impl HttpJobService {
        pub fn new(servers: &[FmeServer]) -> Self {
            let agent = ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(10))
                .build();
            let servers = servers
                .iter()
                .filter_map(|s| s.id.map(|id| (id, base_url(&s.server, s.port))))
                .collect();
            Self { agent, servers }
        }

        /// `Ok(None)` when the server answered with an error status
        fn get(&self, url: &str) -> Result<Option<ureq::Response>> {
            log::debug!("GET {}", url);
            match self.agent.get(url).call() {
                Ok(response) => Ok(Some(response)),
                Err(ureq::Error::Status(code, _)) => {
                    log::warn!("{} answered with status {}", url, code);
                    Ok(None)
                }
                Err(e) => Err(anyhow!("Request to {} failed: {}", url, e)),
            }
        }
    }

    fn base_url(server: &str, port: u16) -> String {
        let server = server.trim_end_matches('/');
        if server.starts_with("http://") || server.starts_with("https://") {
            format!("{}:{}", server, port)
        } else {
            format!("http://{}:{}", server, port)
        }
    }

    impl JobService for HttpJobService {
        fn check_connection(&self, server: &str, port: u16) -> Result<bool> {
            let url = format!("{}/api/", base_url(server, port));
            Ok(self.get(&url)?.is_some())
        }

        fn validate_routine_parameters(&self, routines: &[RoutineRef]) -> Result<bool> {
            for routine in routines {
                let base = self
                    .servers
                    .get(&routine.fme_server_id)
                    .ok_or_else(|| anyhow!("FME server {} is not registered", routine.fme_server_id))?;
                let url = format!("{}/api/rotinas/{}", base, routine.routine);
                let Some(response) = self.get(&url)? else {
                    return Ok(false);
                };
                let details: RoutineResponse = response
                    .into_json()
                    .with_context(|| format!("Unexpected routine description from {}", url))?;
                let declared: Vec<String> = details
                    .dados
                    .parametros
                    .iter()
                    .map(|p| p.to_lowercase())
                    .collect();
                if let Some(missing) = PIPELINE_PARAMETERS
                    .iter()
                    .find(|p| !declared.iter().any(|d| d == *p))
                {
                    log::warn!("Routine '{}' does not declare parameter {}", routine.routine, missing);
                    return Ok(false);
                }
            }
            Ok(true)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::io::{Read, Write};
        use std::net::TcpListener;
        use std::thread;

        /// Answer `count` requests with a fixed status and body, returning the port
        fn serve(count: usize, status: &'static str, body: &'static str) -> u16 {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            thread::spawn(move || {
                for stream in listener.incoming().take(count) {
                    let mut stream = stream.unwrap();
                    let mut buf = [0u8; 2048];
                    let _ = stream.read(&mut buf);
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    stream.write_all(response.as_bytes()).unwrap();
                }
            });
            port
        }

        fn closed_port() -> u16 {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        }

        fn service_for(port: u16) -> HttpJobService {
            HttpJobService::new(&[FmeServer { id: Some(1), server: "127.0.0.1".into(), port }])
        }

        fn routine() -> Vec<RoutineRef> {
            vec![RoutineRef { fme_server_id: 1, routine: "validate_hydro".into() }]
        }

        #[test]
        fn test_base_url() {
            assert_eq!(base_url("fme.local", 8080), "http://fme.local:8080");
            assert_eq!(base_url("https://fme.local/", 443), "https://fme.local:443");
        }

        #[test]
        fn test_check_connection() {
            let port = serve(1, "200 OK", "{}");
            assert!(service_for(port).check_connection("127.0.0.1", port).unwrap());

            let port = serve(1, "503 Service Unavailable", "{}");
            assert!(!service_for(port).check_connection("127.0.0.1", port).unwrap());

            let port = closed_port();
            assert!(service_for(port).check_connection("127.0.0.1", port).is_err());
        }

        #[test]
        fn test_routine_with_pipeline_parameters() {
            let port = serve(1, "200 OK", r#"{"dados": {"parametros": ["dbName", "dbHost", "dbPort", "LOG"]}}"#);
            assert!(service_for(port).validate_routine_parameters(&routine()).unwrap());
        }

        #[test]
        fn test_routine_missing_parameters() {
            let port = serve(1, "200 OK", r#"{"dados": {"parametros": ["dbName"]}}"#);
            assert!(!service_for(port).validate_routine_parameters(&routine()).unwrap());

            let port = serve(1, "404 Not Found", "{}");
            assert!(!service_for(port).validate_routine_parameters(&routine()).unwrap());
        }

        #[test]
        fn test_routine_on_unknown_server() {
            let service = HttpJobService::new(&[]);
            assert!(service.validate_routine_parameters(&routine()).is_err());
        }
    }
}

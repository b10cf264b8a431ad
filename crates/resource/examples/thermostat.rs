//! A thermostat exposing its setpoint as a JSON resource.
//!
//! ```text
//! curl -H 'Accept: application/json' http://127.0.0.1:8080/thermostat
//! curl -X POST -H 'Content-Type: application/json' -d '{"setpoint": 22.5}' http://127.0.0.1:8080/thermostat
//! curl -X PUT -d 'eco' http://127.0.0.1:8080/thermostat
//! ```

use std::error::Error;

use bytes::Bytes;
use http::Method;
use micro_resource::{MediaType, Methods, ResourceServer};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let server = ResourceServer::default();
    server.init(8080, None, None).await?;

    let thermostat = server.add_resource("/thermostat", Some(r#"{"setpoint": 21.0}"#.into()), Some(MediaType::Json))?;
    thermostat.bind_callback(Methods::POST | Methods::PUT, |uri: &str, method: &Method, body: &Bytes| {
        info!(uri, %method, body = %String::from_utf8_lossy(body), "thermostat updated");
    })?;

    info!("thermostat listening on http://127.0.0.1:8080/thermostat, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;

    server.shutdown().await?;
    Ok(())
}

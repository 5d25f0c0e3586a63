//! Skirmish Server Binary
//!
//! Hosts session workers, the WebSocket gateway, and the save-slot API.
//! Runs on BIND_ADDR (e.g. 0.0.0.0:8888).

#[tokio::main]
async fn main() {
    skr_core::log();
    skr_core::trap();
    skr_server::run().await.unwrap();
}

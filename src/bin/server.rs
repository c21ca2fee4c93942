//! Enrollment service entry point.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    opencourse_enrollment::server::run().await
}

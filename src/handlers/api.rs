/// Health check for non-upgrade requests
pub async fn health_check() -> &'static str {
    "Voice Guide relay is active"
}

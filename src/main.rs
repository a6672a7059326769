use taskmap::ui_dioxus::App;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("taskmap=info")))
        .init();

    dioxus::launch(App);
}

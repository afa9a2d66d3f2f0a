use std::env;
use std::process;
use stockflow::app::App;
use stockflow_core::task::runner::Runner;
use tracing::error;

#[tokio::main]
async fn main() {
    // Install global log collector.
    tracing_subscriber::fmt::init();

    // An absent CONFIG_PATH runs the built-in default flow.
    let config_path = env::var("CONFIG_PATH").ok().map(Into::into);

    let app = App { config_path };
    if let Err(err) = app.run().await {
        error!("{:?}", err);
        process::exit(1);
    }
}

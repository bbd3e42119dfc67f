use dotenvy::dotenv;
use log::info;
use storefront_server::{
    cli::handle_command_line_args,
    config::ServerConfig,
    hooks::create_event_hooks,
    server::run_server,
};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = ServerConfig::from_env_or_default();
    let hooks = create_event_hooks();

    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    match run_server(config, hooks).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}

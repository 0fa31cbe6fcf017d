use autopaste::cli::PasteCli;
use autopaste::clipboard::PasteText;
use autopaste::clipboard::x11::XclipClipboard;
use autopaste::config::ClientConfig;
use clap::{CommandFactory, Parser};

#[tokio::main]
async fn main() {
    autopaste::init_tracing();

    let cli = PasteCli::parse();

    let Some(text) = PasteText::from_words(&cli.text) else {
        println!("{}", PasteCli::command().render_usage());
        std::process::exit(2);
    };

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("autopaste: {e}");
            std::process::exit(1);
        }
    };

    let clipboard = XclipClipboard::new(config.lock_path.clone(), config.lock_timeout);
    if let Err(e) = autopaste::client::run(&text, clipboard, &config).await {
        tracing::error!(error = %e, "paste failed");
        eprintln!("autopaste: {e}");
    }
}

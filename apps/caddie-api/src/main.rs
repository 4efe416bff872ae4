use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = caddie_api::Args::parse();
	caddie_api::run(args).await
}

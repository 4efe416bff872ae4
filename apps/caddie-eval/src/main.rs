use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = caddie_eval::Args::parse();
	caddie_eval::run(args).await
}

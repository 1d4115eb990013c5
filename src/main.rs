fn main() -> anyhow::Result<()> {
    mynote_client::cli::run()
}

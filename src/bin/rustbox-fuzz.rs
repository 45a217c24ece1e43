use anyhow::Result;

fn main() -> Result<()> {
    rustbox_fuzz::cli::run()
}

use pbc::driver;

fn main() -> anyhow::Result<()> {
    driver::run()?;

    Ok(())
}

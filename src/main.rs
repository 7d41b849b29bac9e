#[cfg(target_os = "espidf")]
mod firmware;

#[cfg(not(target_os = "espidf"))]
mod dry_run;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    dry_run::run()
}

fn main() -> anyhow::Result<()> {
    dealerscan_app::run()
}

fn main() -> anyhow::Result<()> {
    repcounter_lib::run()
}

fn main() -> std::process::ExitCode {
    dermsight_lib::run()
}

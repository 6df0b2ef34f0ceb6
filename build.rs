fn main() {
    // HAMB_BUILD_CHANNEL is read from the environment at build time so release
    // builds can be told apart in logs via option_env!("HAMB_BUILD_CHANNEL").
    println!("cargo:rerun-if-env-changed=HAMB_BUILD_CHANNEL");
}

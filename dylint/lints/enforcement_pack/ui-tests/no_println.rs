// Test case for NO_PRINTLN lint

fn bad_println() {
    println!("validated ST-{}", "0123456789abcdef");
}

fn bad_eprintln() {
    eprintln!("store closed");
}

fn bad_dbg() {
    let password = "wonderland";
    dbg!(password);
}

// Good: using tracing
fn good_tracing() {
    tracing::info!(ticket = "ST-012345…", "validated");
}

fn main() {
    bad_println();
    bad_eprintln();
    bad_dbg();
    good_tracing();
}

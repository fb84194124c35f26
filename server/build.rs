// The schema migrations are embedded at compile time by `sqlx::migrate!`,
// so edits to them must trigger a rebuild.
fn main() {
    println!("cargo:rerun-if-changed=migrations");
}

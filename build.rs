const COMMANDS: &[&str] = &[
    "is_device_secure",
    "make_device_secure",
    "keystore_init",
    "store_pin",
    "retrieve_pin",
    "delete_key",
];

fn main() {
    tauri_plugin::Builder::new(COMMANDS).build();
}

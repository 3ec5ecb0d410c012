use std::io::{self, Write};

use anyhow::Result;
use n4d_client::{Client, ClientConfig, Key, Value, DEFAULT_ADDRESS};

fn main() -> Result<()> {
    println!("=== n4d Client Basic Example ===");

    print!("User: ");
    io::stdout().flush()?;
    let mut user = String::new();
    io::stdin().read_line(&mut user)?;
    let user = user.trim();

    // Prefer the user's local key, fall back to a password
    let config = ClientConfig::new().with_address(DEFAULT_ADDRESS).with_user(user);
    let key = Key::load_user_key(user);
    let config = if key.valid() {
        println!("Using local key");
        config.with_key(key)
    } else {
        print!("Password: ");
        io::stdout().flush()?;
        let mut password = String::new();
        io::stdin().read_line(&mut password)?;
        config.with_password(password.trim_end())
    };

    let client = Client::new(config);

    println!("\n1. Validating user:");
    println!("{}", client.validate_user()?);

    println!("\n2. Writing and reading a variable:");
    let mut extra = std::collections::BTreeMap::new();
    extra.insert("extra".to_string(), Value::from(400));
    client.set_variable("patata", Value::from(300), Some(Value::from(extra)))?;
    println!("{}", client.get_variable("patata", true)?);

    println!("\n3. Server version:");
    println!("{}", client.version()?);

    println!("\n✓ Example completed successfully!");
    Ok(())
}

//! Generate a key pair for encrypted login passwords.
//!
//! Prints a TOML snippet that can be pasted into the bridge configuration.

use clap::Parser;

use collector_bridge::crypto::KeyPair;

#[derive(Parser)]
#[command(name = "bridge-keygen")]
#[command(about = "Generate a key pair and optionally encrypt a login password", long_about = None)]
struct Cli {
    /// Password to encrypt with the new key pair
    #[arg(short, long)]
    password: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let keys = KeyPair::generate();

    println!("public_key = \"{}\"", keys.public_base64());
    println!("private_key = \"{}\"", keys.private_base64());

    if let Some(password) = cli.password {
        let encrypted = keys.encrypt_password(&password)?;
        println!();
        println!("# [[login_users]] entry");
        println!("encrypted_password = \"{}\"", encrypted);
    }

    Ok(())
}

use {
    anyhow::Result,
    tokio::io::{AsyncBufReadExt, BufReader},
};

/// Print the argon2 PHC string for `password`, reading it from stdin when
/// not given.
pub async fn hash(password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_stdin_line().await?,
    };
    if password.is_empty() {
        anyhow::bail!("refusing to hash an empty password");
    }
    let phc = warden_cred::hash::hash_password(&password)?;
    println!("{phc}");
    Ok(())
}

/// Read one line from stdin without its line terminator.
pub async fn read_stdin_line() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

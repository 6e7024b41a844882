//! `seed` command implementation.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use contracts::UserRecord;
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::cli::SeedArgs;

const MIN_AGE: i32 = 18;
const MAX_AGE: i32 = 100;

/// Execute the `seed` command
pub fn run_seed(args: &SeedArgs) -> Result<()> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };

    let file = File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    let mut out = BufWriter::new(file);
    for index in 1..=args.count {
        let user = synthetic_user(&mut rng, index);
        serde_json::to_writer(&mut out, &user).context("Failed to encode user")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    info!(count = args.count, output = %args.output.display(), "Users written");
    println!("Wrote {} users to {}", args.count, args.output.display());
    Ok(())
}

/// A user whose username is unique within one file (`index` is embedded).
fn synthetic_user<R: Rng>(rng: &mut R, index: usize) -> UserRecord {
    let tag: String = (&mut *rng)
        .sample_iter(Alphanumeric)
        .take(6)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    let username = format!("user_{index}_{tag}");
    let email = format!("{username}@example.com");
    UserRecord::new(username, email, rng.random_range(MIN_AGE..=MAX_AGE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[test]
    fn test_users_are_unique_and_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let users: Vec<_> = (1..=500).map(|i| synthetic_user(&mut rng, i)).collect();

        let names: HashSet<_> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names.len(), 500);
        assert!(users.iter().all(|u| (MIN_AGE..=MAX_AGE).contains(&u.age)));
        assert!(users.iter().all(|u| u.email.ends_with("@example.com")));
    }

    #[test]
    fn test_same_seed_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str| -> PathBuf {
            let output = dir.path().join(name);
            run_seed(&SeedArgs {
                output: output.clone(),
                count: 20,
                seed: Some(42),
            })
            .unwrap();
            output
        };

        let a = std::fs::read_to_string(write("a.jsonl")).unwrap();
        let b = std::fs::read_to_string(write("b.jsonl")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.lines().count(), 20);
        let first: UserRecord = serde_json::from_str(a.lines().next().unwrap()).unwrap();
        assert!(first.username.starts_with("user_1_"));
    }
}

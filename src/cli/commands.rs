//! Subcommand handlers

use crate::cli::args::{Args, Command, PlayerSource};
use crate::cli::output::OutputFormatter;
use crate::platform::cipher::Cipher;
use crate::platform::player::PlayerStore;
use crate::platform::signing::sign_url;
use anyhow::{bail, Context};
use std::sync::Arc;
use tracing::debug;

/// Load the cipher from a script file or a player script URL
pub async fn load_cipher(source: &PlayerSource, store: &PlayerStore) -> anyhow::Result<Arc<Cipher>> {
    if let Some(path) = &source.script {
        debug!("Reading player script from {}", path.display());
        let js = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        return Ok(Arc::new(Cipher::from_js(&js)?));
    }
    if let Some(url) = &source.player_url {
        return Ok(store.cipher_for(url).await?);
    }
    bail!("either --script or --player-url is required")
}

/// Run one subcommand
pub async fn run(args: &Args, formatter: &OutputFormatter) -> anyhow::Result<()> {
    let store = PlayerStore::new(args.player_config())?;

    match &args.command {
        Command::Sig { player, signature } => {
            let cipher = load_cipher(player, &store).await?;
            formatter.result(&cipher.decrypt_signature(signature));
        }
        Command::Nsig { player, n } => {
            let cipher = load_cipher(player, &store).await?;
            formatter.result(&cipher.calculate_throttle_parameter(n)?);
        }
        Command::Sign { player, url, s, sp } => {
            let cipher = load_cipher(player, &store).await?;
            formatter.result(&sign_url(&cipher, url, s.as_deref(), Some(sp.as_str()))?);
        }
        Command::Inspect { url, itag, json } => {
            let streams = store
                .streams(url)
                .await
                .with_context(|| format!("failed to resolve {}", url))?;

            let selected: Vec<_> = match itag {
                Some(itag) => match streams.get_by_itag(*itag) {
                    Some(stream) => vec![stream],
                    None => bail!("no stream with itag {}", itag),
                },
                None => streams.iter().collect(),
            };

            if *json {
                formatter.result(&serde_json::to_string_pretty(&selected)?);
                return Ok(());
            }

            if let Some(first) = selected.first() {
                formatter.print_video_info(first.context(), streams.len());
            }
            for stream in selected {
                formatter.print_stream(stream);
            }
            formatter.success(&format!("Resolved {} streams", streams.len()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::VerbosityLevel;
    use crate::platform::player::PlayerConfig;
    use std::io::Write;

    const BASE_JS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/base.js"));

    #[tokio::test]
    async fn test_load_cipher_from_script_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BASE_JS.as_bytes()).unwrap();

        let source = PlayerSource {
            script: Some(file.path().to_path_buf()),
            player_url: None,
        };
        let store = PlayerStore::new(PlayerConfig::default()).unwrap();
        let cipher = load_cipher(&source, &store).await.unwrap();

        assert_eq!(cipher.decrypt_signature("abcdef"), "abfd");
        assert_eq!(
            cipher.calculate_throttle_parameter("vz6Q0Q4nXxk0YJPb").unwrap(),
            "sZzffdLd7kHC39h7"
        );
    }

    #[tokio::test]
    async fn test_load_cipher_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = PlayerSource {
            script: Some(dir.path().join("missing.js")),
            player_url: None,
        };
        let store = PlayerStore::new(PlayerConfig::default()).unwrap();
        let err = load_cipher(&source, &store).await.unwrap_err();
        assert!(err.to_string().contains("missing.js"));
    }

    #[tokio::test]
    async fn test_run_sign_command() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(BASE_JS.as_bytes()).unwrap();

        let args = Args {
            command: Command::Sign {
                player: PlayerSource {
                    script: Some(file.path().to_path_buf()),
                    player_url: None,
                },
                url: "https://r1.example.com/videoplayback?itag=18&n=vz6Q0Q4nXxk0YJPb".to_string(),
                s: Some("abcdef".to_string()),
                sp: "sig".to_string(),
            },
            ..Default::default()
        };
        let formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        run(&args, &formatter).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_inspect_unknown_itag() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/watch")
            .match_query(mockito::Matcher::Any)
            .with_body(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/watch.html")))
            .create_async()
            .await;
        server
            .mock("GET", "/s/player/3a2b1c0d/player_ias.vflset/en_US/base.js")
            .with_body(BASE_JS)
            .create_async()
            .await;

        let args = Args {
            command: Command::Inspect {
                url: "dQw4w9WgXcQ".to_string(),
                itag: Some(999),
                json: false,
            },
            base_url: server.url(),
            ..Default::default()
        };
        let formatter = OutputFormatter::new(VerbosityLevel::Quiet);
        let err = run(&args, &formatter).await.unwrap_err();
        assert!(err.to_string().contains("itag 999"));
    }
}

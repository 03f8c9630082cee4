// Interactive text menu over stdin/stdout, the terminal counterpart of the
// web pages.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};

use crate::error::Result;
use crate::models::{DeckResponse, DEFAULT_CARD_LEVEL};
use crate::service::DeckService;

/// Line that ends a pasted meta snapshot.
pub const PASTE_TERMINATOR: &str = "END";

/// Run the menu on the process's stdin and stdout until the user quits.
pub async fn run(service: &DeckService) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    Menu::new(service, stdin, tokio::io::stdout()).run().await
}

pub struct Menu<'a, R, W> {
    service: &'a DeckService,
    input: Lines<R>,
    out: W,
}

impl<'a, R, W> Menu<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(service: &'a DeckService, input: R, out: W) -> Self {
        Self {
            service,
            input: input.lines(),
            out,
        }
    }

    /// Consume the menu and hand back the output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    async fn say(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }

    /// Print `label` and read one trimmed line; `None` at end of input.
    async fn ask(&mut self, label: &str) -> Result<Option<String>> {
        self.out.write_all(label.as_bytes()).await?;
        self.out.flush().await?;
        Ok(self
            .input
            .next_line()
            .await?
            .map(|line| line.trim().to_string()))
    }

    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.say(
                "\n=== Clash Deck Builder ===\n\
                 1) Refresh card catalog (vendor API)\n\
                 2) Update meta (paste snapshot JSON)\n\
                 3) Players\n\
                 4) Build 3 decks\n\
                 0) Quit",
            )
            .await?;
            let Some(choice) = self.ask("Option: ").await? else {
                break;
            };
            let outcome = match choice.as_str() {
                "1" => self.refresh_catalog().await,
                "2" => self.paste_meta().await,
                "3" => self.players_menu().await,
                "4" => self.build_decks().await,
                "0" => break,
                _ => self.say("Invalid option.").await,
            };
            if let Err(e) = outcome {
                tracing::error!("Menu action failed: {e}");
                self.say(&format!("Error: {e}")).await?;
            }
        }
        Ok(())
    }

    async fn refresh_catalog(&mut self) -> Result<()> {
        let total = self.service.refresh_catalog().await?;
        self.say(&format!("Card catalog updated: {total} cards.")).await
    }

    async fn paste_meta(&mut self) -> Result<()> {
        self.say(&format!(
            "Paste the full meta snapshot JSON. Finish with a line containing only {PASTE_TERMINATOR}."
        ))
        .await?;
        let mut lines = Vec::new();
        while let Some(line) = self.input.next_line().await? {
            if line.trim().eq_ignore_ascii_case(PASTE_TERMINATOR) {
                break;
            }
            lines.push(line);
        }
        let meta = self.service.update_meta_text(&lines.join("\n")).await?;
        self.say(&format!(
            "Meta saved ({} archetypes).",
            meta.archetypes.len()
        ))
        .await
    }

    // ── Players ──────────────────────────────────────────────────────

    async fn players_menu(&mut self) -> Result<()> {
        self.say(
            "\n=== Players ===\n\
             1) Create empty player\n\
             2) Delete player\n\
             3) Add card (level / evolution)\n\
             4) Import by tag (vendor API)\n\
             5) List players\n\
             0) Back",
        )
        .await?;
        let Some(choice) = self.ask("Option: ").await? else {
            return Ok(());
        };
        match choice.as_str() {
            "1" => self.create_player().await,
            "2" => self.delete_player().await,
            "3" => self.add_card().await,
            "4" => self.import_player().await,
            "5" => self.list_players().await,
            _ => Ok(()),
        }
    }

    async fn create_player(&mut self) -> Result<()> {
        let id = self.ask("Player id (e.g. samuel): ").await?.unwrap_or_default();
        let player = self.service.create_player(&id).await?;
        self.say(&format!("Player '{}' created.", player.player_id)).await
    }

    async fn delete_player(&mut self) -> Result<()> {
        let id = self.ask("Player id to delete: ").await?.unwrap_or_default();
        if self.service.delete_player(&id).await? {
            self.say("Deleted.").await
        } else {
            self.say("Player not found.").await
        }
    }

    async fn add_card(&mut self) -> Result<()> {
        let id = self.ask("Player id: ").await?.unwrap_or_default();
        let player = self.service.get_player(&id).await?;
        let name = self.ask("Exact card name (English): ").await?.unwrap_or_default();
        let level = self
            .ask("Card level (e.g. 12): ")
            .await?
            .and_then(|l| l.parse::<u32>().ok())
            .unwrap_or(DEFAULT_CARD_LEVEL);
        let evolution = self
            .ask("Evolution unlocked for this card? (y/n): ")
            .await?
            .is_some_and(|a| a.eq_ignore_ascii_case("y"));
        let player = self
            .service
            .add_card(&player.player_id, &name, Some(level), evolution)
            .await?;
        self.say(&format!(
            "Card '{}' level {level} (evolution={evolution}) added to {}.",
            name.trim(),
            player.player_id
        ))
        .await
    }

    async fn import_player(&mut self) -> Result<()> {
        let id = self.ask("Local player id (e.g. samuel): ").await?.unwrap_or_default();
        let tag = self.ask("Player tag (e.g. #ABCD123): ").await?.unwrap_or_default();
        let cards = self.service.import_player(&id, &tag).await?;
        self.say(&format!(
            "Player '{}' imported with {cards} cards.\n\
             Evolutions start disabled; use 'Add card' to enable the ones you own.",
            id.trim().to_lowercase()
        ))
        .await
    }

    async fn list_players(&mut self) -> Result<()> {
        let players = self.service.list_players().await?;
        if players.is_empty() {
            return self.say("No players yet.").await;
        }
        self.say(&players.join("\n")).await
    }

    // ── Decks ────────────────────────────────────────────────────────

    async fn build_decks(&mut self) -> Result<()> {
        let players = self.service.list_players().await?;
        if players.is_empty() {
            return self.say("No players yet. Create or import one first.").await;
        }
        let listing: Vec<String> = players
            .iter()
            .enumerate()
            .map(|(i, p)| format!("{}) {p}", i + 1))
            .collect();
        self.say(&format!("\n=== Select player ===\n{}", listing.join("\n")))
            .await?;
        let picked = self
            .ask("Choice: ")
            .await?
            .and_then(|c| c.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| players.get(i).cloned());
        let Some(player_id) = picked else {
            return self.say("Invalid choice.").await;
        };
        let prompt = self
            .ask("Describe the deck (e.g. '2.6 cycle with Hog Rider'): ")
            .await?
            .unwrap_or_default();
        let result = self.service.build_decks(&player_id, &prompt).await?;
        self.say(&render_decks(&result)).await
    }
}

/// Plain-text rendering of a deck response.
pub fn render_decks(result: &DeckResponse) -> String {
    let mut out = String::from("\n=== Suggested decks ===");
    for (i, deck) in result.decks.iter().enumerate() {
        out.push_str(&format!("\n\nDeck {}:", i + 1));
        for card in &deck.cards {
            out.push_str(&format!("\n- {card}"));
        }
        if let Some(avg) = deck.avg_elixir {
            out.push_str(&format!("\nAverage elixir: {avg}"));
        }
        if !deck.evolved_cards.is_empty() {
            out.push_str(&format!("\nEvolutions: {}", deck.evolved_cards.join(", ")));
        }
        if !deck.reasons.is_empty() {
            out.push_str(&format!("\nReasons: {}", deck.reasons));
        }
        if !deck.warnings.is_empty() {
            out.push_str(&format!("\nWarnings: {}", deck.warnings));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::DeckSuggestion;
    use crate::store::Store;

    fn service(dir: &tempfile::TempDir) -> DeckService {
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        DeckService::new(config, Store::new(dir.path()), None)
    }

    async fn run_script(service: &DeckService, script: &str) -> String {
        let mut menu = Menu::new(service, script.as_bytes(), Vec::new());
        menu.run().await.unwrap();
        String::from_utf8(menu.into_output()).unwrap()
    }

    #[tokio::test]
    async fn test_paste_meta_until_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let script = "2\n{\"period\": \"summer\",\n \"archetypes\": [{\"name\": \"Hog 2.6\", \"cards\": [\"Hog Rider\"]}]}\nend\n0\n";
        let out = run_script(&svc, script).await;
        assert!(out.contains("Meta saved (1 archetypes)."));
        let meta = svc.store().get_meta().await.unwrap();
        assert_eq!(meta.period, "summer");
    }

    #[tokio::test]
    async fn test_invalid_meta_returns_to_menu() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let out = run_script(&svc, "2\nnot json\nEND\n9\n0\n").await;
        assert!(out.contains("Error: invalid meta JSON"));
        assert!(out.contains("Invalid option."));
    }

    #[tokio::test]
    async fn test_player_create_and_add_card() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let script = "3\n1\nSamuel\n3\n3\nsamuel\nKnight\nabc\ny\n3\n5\n0\n";
        let out = run_script(&svc, script).await;
        assert!(out.contains("Player 'samuel' created."));
        assert!(out.contains("Card 'Knight' level 11 (evolution=true) added to samuel."));
        let player = svc.get_player("samuel").await.unwrap();
        assert!(player.cards_owned["Knight"].evolution);
    }

    #[tokio::test]
    async fn test_build_without_players() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let out = run_script(&svc, "4\n").await;
        assert!(out.contains("No players yet."));
    }

    #[test]
    fn test_render_decks_skips_empty_fields() {
        let result = DeckResponse {
            decks: vec![DeckSuggestion {
                cards: vec!["Knight".into(), "Archers".into()],
                avg_elixir: None,
                evolved_cards: vec!["Knight".into()],
                reasons: "cheap".into(),
                warnings: String::new(),
            }],
        };
        let text = render_decks(&result);
        assert!(text.contains("Deck 1:\n- Knight\n- Archers\nEvolutions: Knight\nReasons: cheap"));
        assert!(!text.contains("Average elixir"));
        assert!(!text.contains("Warnings"));
    }
}

//! `forkreach chat` — Single-message or interactive chat mode.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use forkreach_agents::{FinishReason, Frame, ResponseStreamer, Session, StreamRequest};
use forkreach_config::AppConfig;
use forkreach_core::context::SessionContext;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub struct ChatOptions {
    pub agent: Option<String>,
    pub model: Option<String>,
    pub product: Option<PathBuf>,
    pub frames: bool,
}

pub async fn run(message: Option<String>, options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let streamer = Arc::new(ResponseStreamer::from_config(&config)?);
    let context = options.product.as_deref().map(load_product).transpose()?;

    if let Some(msg) = message {
        // Single message mode
        let request = StreamRequest {
            message: msg,
            handler_id: options.agent,
            model: options.model,
            context,
            history: Vec::new(),
        };
        let rx = streamer.stream(request);
        let reason = render(rx, options.frames, &streamer, &mut std::io::stdout()).await?;
        if reason != Some(FinishReason::Stop) {
            return Err("Generation did not complete".into());
        }
        return Ok(());
    }

    // Interactive mode
    let mut session = Session::new(Arc::clone(&streamer));
    if let Some(model) = options.model {
        session = session.with_model(model);
    }
    if let Some(ctx) = context {
        session.attach_context(ctx);
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        ForkReach Chat — Interactive Mode     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", streamer.backends().default_model());
    println!(
        "  Agent:     {}",
        options.agent.as_deref().unwrap_or("auto")
    );
    if let Some(ctx) = session.context() {
        println!("  Product:   {}", ctx.name);
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  '/clear' forgets the conversation, 'exit' quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "exit" | "quit" => break,
            "/clear" => {
                session.clear_history().await;
                println!("  (history cleared)");
                continue;
            }
            _ => {}
        }

        let rx = session.send(line, options.agent.as_deref()).await;
        render(rx, options.frames, &streamer, &mut std::io::stdout()).await?;
        println!();
    }

    println!("  Goodbye!");
    Ok(())
}

/// Reads the product description used as session context.
fn load_product(path: &Path) -> Result<SessionContext, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let ctx: SessionContext =
        toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {e}", path.display()))?;
    Ok(ctx)
}

/// Writes one response to `out` and returns its finish reason.
///
/// With `frames` every frame is a JSON line; otherwise only the text is
/// written, prefixed by the answering agent's name.
async fn render<W: Write>(
    mut rx: mpsc::Receiver<Frame>,
    frames: bool,
    streamer: &ResponseStreamer,
    out: &mut W,
) -> std::io::Result<Option<FinishReason>> {
    let mut reason = None;
    while let Some(frame) = rx.recv().await {
        if frames {
            writeln!(out, "{}", frame.to_json())?;
        } else {
            match &frame {
                Frame::Start {
                    handler_id: Some(id),
                    ..
                } => {
                    let name = streamer
                        .router()
                        .registry()
                        .get(id)
                        .map(|h| h.info().name.clone())
                        .unwrap_or_else(|| id.clone());
                    write!(out, "  {name} > ")?;
                }
                Frame::TextDelta { delta, .. } => write!(out, "{delta}")?,
                Frame::Finish { .. } => writeln!(out)?,
                _ => {}
            }
        }
        out.flush()?;
        if let Some(r) = frame.finish_reason() {
            reason = Some(r);
        }
    }
    Ok(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forkreach_agents::FrameIds;

    fn streamer() -> ResponseStreamer {
        ResponseStreamer::from_config(&AppConfig::default()).unwrap()
    }

    fn feed(frames: Vec<Frame>) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(frames.len().max(1));
        for frame in frames {
            tx.try_send(frame).unwrap();
        }
        rx
    }

    fn reply(handler: Option<&str>, parts: &[&str], reason: FinishReason) -> Vec<Frame> {
        let ids = FrameIds::new();
        let mut frames = vec![ids.start(handler), ids.text_start()];
        frames.extend(parts.iter().map(|p| ids.delta(*p)));
        frames.push(ids.text_end());
        frames.push(ids.finish(reason));
        frames
    }

    #[tokio::test]
    async fn text_mode_prints_agent_and_deltas() {
        let rx = feed(reply(Some("twitter"), &["Ship ", "it"], FinishReason::Stop));
        let mut out = Vec::new();
        let reason = render(rx, false, &streamer(), &mut out).await.unwrap();

        assert_eq!(reason, Some(FinishReason::Stop));
        assert_eq!(String::from_utf8(out).unwrap(), "  Twitter/X Agent > Ship it\n");
    }

    #[tokio::test]
    async fn frames_mode_prints_one_json_line_per_frame() {
        let rx = feed(reply(None, &["oops"], FinishReason::Error));
        let mut out = Vec::new();
        let reason = render(rx, true, &streamer(), &mut out).await.unwrap();

        assert_eq!(reason, Some(FinishReason::Error));
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0]["type"], "start");
        assert_eq!(lines[2]["delta"], "oops");
        assert_eq!(lines[4]["finishReason"], "error");
    }

    #[tokio::test]
    async fn closed_stream_without_finish_has_no_reason() {
        let ids = FrameIds::new();
        let rx = feed(vec![ids.start(Some("email"))]);
        let mut out = Vec::new();
        assert_eq!(render(rx, false, &streamer(), &mut out).await.unwrap(), None);
    }

    #[test]
    fn product_file_parses_as_context() {
        let dir = std::env::temp_dir().join(format!("forkreach-product-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("product.toml");
        std::fs::write(
            &path,
            r#"
name = "DevTodo"
tagline = "Todos for developers"
key_features = ["CLI first", "Git sync"]
brand_voice = "playful"
"#,
        )
        .unwrap();

        let ctx = load_product(&path).unwrap();
        assert_eq!(ctx.name, "DevTodo");
        assert_eq!(ctx.key_features.len(), 2);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_product_file_is_an_error() {
        let err = load_product(Path::new("/nonexistent/product.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}

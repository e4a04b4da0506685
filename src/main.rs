use colored::*;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use wallgen::{
    AppConfig, GenerationController, GenerationState, ImagenClient, OverlayAction, OverlayTarget,
    PreviewOverlay, RejectReason, SubmitOutcome,
};

struct Terminal {
    lines: Lines<BufReader<Stdin>>,
}

impl Terminal {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// `None` on end of input.
    async fn ask(&mut self, question: &str) -> std::io::Result<Option<String>> {
        use std::io::Write;
        print!("{} ", question.bold());
        std::io::stdout().flush()?;
        self.lines.next_line().await
    }

    /// Reads without echo. `None` on end of input.
    async fn ask_secret(&self, question: &str) -> std::io::Result<Option<String>> {
        let question = format!("{} ", question.bold());
        let answer = tokio::task::spawn_blocking(move || rpassword::prompt_password(question))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        match answer {
            Ok(secret) => Ok(Some(secret)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    let config = AppConfig::from_env()?;
    wallgen::logger::init_with_config(config.logger.clone())?;
    if dotenv_loaded {
        log::debug!("✅ .env file loaded");
    }
    let client = ImagenClient::new(config.imagen)?;
    log::info!(
        "Using model {} at {}",
        client.config().model,
        client.config().api_base
    );

    let controller = GenerationController::new(Arc::new(client));
    let mut terminal = Terminal::new();

    println!("{}", "AI 배경화면 생성기".magenta().bold());
    println!("{}", "나만의 특별한 휴대폰 배경화면을 만들어보세요.".bright_black());

    let Some(key) = terminal.ask_secret("Google AI Studio API 키:").await? else {
        return Ok(());
    };
    controller.set_credential(key);

    loop {
        let current = controller.prompt();
        let question = if current.trim().is_empty() {
            "어떤 분위기의 배경화면을 원하시나요? (q: 종료)".to_string()
        } else {
            format!("프롬프트 [{}] (Enter: 다시 생성, q: 종료)", current.trim())
        };
        let Some(line) = terminal.ask(&question).await? else {
            break;
        };
        match line.trim() {
            "q" => break,
            "" => {}
            prompt => controller.set_prompt(prompt),
        }

        if controller.can_submit() {
            println!("{}", "생성 중...".yellow());
        }
        match controller.generate().await {
            SubmitOutcome::Rejected(RejectReason::EmptyCredential) => {
                let Some(key) = terminal.ask_secret("API 키를 여기에 붙여넣으세요:").await? else {
                    break;
                };
                controller.set_credential(key);
                continue;
            }
            SubmitOutcome::Rejected(reason) => {
                log::debug!("Submission rejected: {:?}", reason);
                println!("{}", "프롬프트를 입력해주세요.".red());
                continue;
            }
            SubmitOutcome::Completed => {}
        }

        let state = controller.state();
        render(&state);
        if state.images.is_empty() {
            continue;
        }

        browse(&controller, &mut terminal, state.images.len()).await?;
    }

    log::info!("👋 Session ended");
    Ok(())
}

fn render(state: &GenerationState) {
    if let Some(error) = &state.error {
        println!("{}", error.red());
        return;
    }
    if state.images.is_empty() {
        println!("{}", "생성된 배경화면이 여기에 표시됩니다.".bright_black());
        return;
    }

    for (row, pair) in state.images.chunks(2).enumerate() {
        let cells: Vec<String> = pair
            .iter()
            .enumerate()
            .map(|(col, image)| {
                let number = row * 2 + col + 1;
                let kib = image.data.len() * 3 / 4 / 1024;
                format!("[{}] {} KiB {}", number, kib, image.extension())
            })
            .collect();
        println!("  {}", cells.join("    "));
    }
}

/// Let the user open images until they go back to the prompt. Remix goes back too.
async fn browse(
    controller: &GenerationController,
    terminal: &mut Terminal,
    count: usize,
) -> std::io::Result<()> {
    loop {
        let Some(line) = terminal
            .ask(&format!("미리볼 번호 1-{} (Enter: 프롬프트로)", count))
            .await?
        else {
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }
        let Some(index) = line.parse::<usize>().ok().and_then(|n| n.checked_sub(1)) else {
            println!("{}", "번호를 입력해주세요.".red());
            continue;
        };
        if !controller.select_image(index) {
            println!("{}", "해당 번호의 이미지가 없습니다.".red());
            continue;
        }

        if preview(controller, terminal).await? == OverlayAction::Remixed {
            return Ok(());
        }
    }
}

async fn preview(
    controller: &GenerationController,
    terminal: &mut Terminal,
) -> std::io::Result<OverlayAction> {
    let Some(image) = controller.selected_image() else {
        return Ok(OverlayAction::None);
    };
    let mut overlay = PreviewOverlay::new(
        &image,
        || controller.close_preview(),
        || controller.remix(),
    );

    loop {
        let Some(line) = terminal.ask("[d] 다운로드  [r] 리믹스  [c] 닫기").await? else {
            overlay.click(OverlayTarget::CloseButton);
            return Ok(OverlayAction::Closed);
        };
        let target = match line.trim() {
            "d" => OverlayTarget::DownloadButton,
            "r" => OverlayTarget::RemixButton,
            "c" | "" => OverlayTarget::CloseButton,
            _ => OverlayTarget::Image,
        };

        match overlay.click(target) {
            OverlayAction::DownloadRequested => match overlay.download(".") {
                Ok(path) => println!("{} {}", "저장됨:".green(), path.display()),
                Err(e) => {
                    log::error!("Download failed: {}", e);
                    println!("{}", "다운로드에 실패했습니다.".red());
                }
            },
            OverlayAction::None => {}
            action => return Ok(action),
        }
    }
}

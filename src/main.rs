use clap::{Parser, Subcommand};
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tokio::sync::mpsc;

use sphere_tutor_rs::config::Config;
use sphere_tutor_rs::content::ContentClient;
use sphere_tutor_rs::net_link::NetEvent;
use sphere_tutor_rs::notes::NoteStore;
use sphere_tutor_rs::session::{LiveSession, MediaEvent};
use sphere_tutor_rs::state::SessionState;
use sphere_tutor_rs::visualizer::OrbAnimator;

#[derive(Parser)]
#[command(name = env!("APP_NAME"), version = env!("APP_VERSION"))]
#[command(about = "Sphere: an AI tutor with a live audio/video session")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the interactive live tutoring session (default).
    Live,
    /// Generate a structured course plan.
    Plan {
        topic: String,
        #[arg(long, default_value = "Beginner")]
        level: String,
        #[arg(long, default_value = "Visual")]
        style: String,
    },
    /// Write a Markdown lesson for a module.
    Lesson {
        title: String,
        /// Topics to cover.
        topics: Vec<String>,
    },
    /// Generate a quiz from text read on stdin.
    Quiz,
    /// Ask a question, optionally about a context passage.
    Ask {
        question: String,
        #[arg(long)]
        context: Option<String>,
        /// Use the deep-reasoning model with an extended thinking budget.
        #[arg(long)]
        deep: bool,
    },
    /// Recommend subjects for an education level and focus.
    Recommend {
        level: String,
        grade: String,
        focus: String,
    },
    /// Generate a personalized resource list.
    Library { grade: String, stream: String },
    /// Text-to-speech; writes base64 audio to stdout.
    Speak { text: String },
    /// Transcribe a base64 audio clip read on stdin.
    Transcribe {
        #[arg(long, default_value = "audio/wav")]
        mime_type: String,
    },
    /// Manage study notes.
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
}

#[derive(Subcommand)]
enum NotesCommand {
    Add {
        course: String,
        module: String,
        text: String,
        #[arg(long)]
        quote: Option<String>,
    },
    List {
        course: String,
        module: String,
    },
    Remove {
        course: String,
        module: String,
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().map_err(|e| anyhow::anyhow!(e))?;

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Live) {
        Command::Live => run_live(config).await,
        Command::Plan {
            topic,
            level,
            style,
        } => {
            let client = ContentClient::new(&config);
            let plan = client.generate_course_plan(&topic, &level, &style).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "title": plan.title,
                "description": plan.description,
                "modules": plan.modules.iter().map(|m| serde_json::json!({
                    "title": m.title,
                    "topics": m.topics,
                })).collect::<Vec<_>>(),
            }))?);
            Ok(())
        }
        Command::Lesson { title, topics } => {
            let client = ContentClient::new(&config);
            println!("{}", client.generate_lesson_content(&title, &topics).await?);
            Ok(())
        }
        Command::Quiz => {
            let context = read_stdin()?;
            let client = ContentClient::new(&config);
            let quiz = client.generate_quiz(&context).await?;
            for (i, q) in quiz.iter().enumerate() {
                println!("{}. {}", i + 1, q.question);
                for (j, option) in q.options.iter().enumerate() {
                    let marker = if j == q.correct_index { "*" } else { " " };
                    println!("  {} {}", marker, option);
                }
                println!("   {}", q.explanation);
            }
            Ok(())
        }
        Command::Ask {
            question,
            context,
            deep,
        } => {
            let client = ContentClient::new(&config);
            let answer = if deep {
                client.ask_complex_query(&question).await?
            } else if let Some(context) = context {
                client.ask_about_context(&context, &question).await?
            } else {
                client.ask_about_context("", &question).await?
            };
            println!("{}", answer);
            Ok(())
        }
        Command::Recommend {
            level,
            grade,
            focus,
        } => {
            let client = ContentClient::new(&config);
            for r in client
                .get_curriculum_recommendations(&level, &grade, &focus)
                .await?
            {
                println!("{}: {}", r.title, r.description);
            }
            Ok(())
        }
        Command::Library { grade, stream } => {
            let client = ContentClient::new(&config);
            for r in client.generate_library_resources(&grade, &stream).await? {
                println!("[{:?}] {} — {} ({})", r.resource_type, r.title, r.author, r.link);
            }
            Ok(())
        }
        Command::Speak { text } => {
            let client = ContentClient::new(&config);
            match client.generate_speech(&text).await? {
                Some(audio) => println!("{}", audio),
                None => eprintln!("No audio generated"),
            }
            Ok(())
        }
        Command::Transcribe { mime_type } => {
            let audio = read_stdin()?;
            let client = ContentClient::new(&config);
            println!("{}", client.transcribe_audio(audio.trim(), &mime_type).await?);
            Ok(())
        }
        Command::Notes { command } => run_notes(&config, command),
    }
}

fn read_stdin() -> anyhow::Result<String> {
    use std::io::Read;
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn run_notes(config: &Config, command: NotesCommand) -> anyhow::Result<()> {
    let mut store = NoteStore::load(config.notes_path)?;
    match command {
        NotesCommand::Add {
            course,
            module,
            text,
            quote,
        } => {
            let note = store.add(&course, &module, quote, text)?;
            println!("Added note {}", note.id);
        }
        NotesCommand::List { course, module } => {
            for note in store.list(&course, &module) {
                match &note.quote {
                    Some(q) => println!("{} [{}] \"{}\": {}", note.created_at, note.id, q, note.text),
                    None => println!("{} [{}] {}", note.created_at, note.id, note.text),
                }
            }
        }
        NotesCommand::Remove { course, module, id } => {
            if store.remove(&course, &module, &id)? {
                println!("Removed note {}", id);
            } else {
                eprintln!("No note {} under {}/{}", id, course, module);
            }
        }
    }
    Ok(())
}

// 键盘输入事件，由独立线程读取后送入主循环
enum InputEvent {
    Key(KeyCode),
}

async fn run_live(config: Config) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    // 键盘输入线程
    let (input_tx, mut input_rx) = mpsc::channel::<InputEvent>(16);
    std::thread::Builder::new()
        .name("input".into())
        .spawn(move || {
            loop {
                match event::read() {
                    Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                        if input_tx.blocking_send(InputEvent::Key(key.code)).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        })?;

    // 会话和它的事件通道，每次启动都重建，避免旧会话的残留事件串台
    let mut session: Option<LiveSession> = None;
    let mut net_rx: Option<mpsc::Receiver<NetEvent>> = None;
    let mut media_rx: Option<mpsc::Receiver<MediaEvent>> = None;
    let mut animator: Option<OrbAnimator> = None;

    let mut render_tick = tokio::time::interval(std::time::Duration::from_millis(33));

    let result = loop {
        tokio::select! {
            Some(input) = input_rx.recv() => {
                let InputEvent::Key(code) = input;
                match code {
                    KeyCode::Char('q') => break Ok(()),
                    KeyCode::Char('s') => {
                        match session.as_mut() {
                            Some(s) if !s.state().is_terminal() => {
                                s.stop();
                            }
                            _ => {
                                let (net_tx, rx) = mpsc::channel::<NetEvent>(100);
                                let (media_tx, mrx) = mpsc::channel::<MediaEvent>(100);
                                let mut s = LiveSession::new(config.clone(), media_tx);
                                s.start(net_tx);
                                animator = Some(OrbAnimator::new(s.tap()));
                                session = Some(s);
                                net_rx = Some(rx);
                                media_rx = Some(mrx);
                            }
                        }
                    }
                    KeyCode::Char('d') => {
                        if let Some(s) = session.as_mut()
                            && let Err(e) = s.toggle_screen_share()
                        {
                            log::warn!("Screen share failed: {:#}", e);
                        }
                    }
                    _ => {}
                }
            }

            Some(event) = recv_opt(&mut net_rx) => {
                if let Some(s) = session.as_mut() {
                    s.handle_net_event(event);
                    if s.state().is_terminal() {
                        net_rx = None;
                        media_rx = None;
                    }
                }
            }

            Some(event) = recv_opt(&mut media_rx) => {
                if let Some(s) = session.as_mut() {
                    s.handle_media_event(event);
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| {
                    draw_ui(frame, session.as_ref(), animator.as_ref());
                })?;
            }
        }
    };

    if let Some(mut s) = session.take() {
        s.stop();
    }
    ratatui::restore();
    result
}

// select! 分支里的可选接收；None 表示当前没有会话通道
async fn recv_opt<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn draw_ui(
    frame: &mut ratatui::Frame,
    session: Option<&LiveSession>,
    animator: Option<&OrbAnimator>,
) {
    let [status_area, orb_area, caption_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(5),
    ])
    .areas(frame.area());

    let state = session.map(|s| s.state()).unwrap_or(SessionState::Idle);
    let sharing = session.is_some_and(|s| s.is_screen_sharing());

    let mut status = format!(" {} ", state.label());
    if sharing {
        status.push_str("| SHARING SCREEN ");
    }
    status.push_str("| [s] start/stop  [d] screen share  [q] quit");

    let status_color = match state {
        SessionState::Open => Color::Green,
        SessionState::Connecting => Color::Yellow,
        SessionState::Errored => Color::Red,
        _ => Color::DarkGray,
    };
    frame.render_widget(
        Paragraph::new(Line::from(status)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(status_color)),
        ),
        status_area,
    );

    if state == SessionState::Open
        && let Some(animator) = animator
    {
        frame.render_widget(animator.widget(), orb_area);
    }

    let caption = session
        .and_then(|s| {
            if let Some(err) = s.error_message() {
                Some(err.to_string())
            } else if s.caption().is_empty() {
                None
            } else {
                Some(s.caption().to_string())
            }
        })
        .unwrap_or_default();
    frame.render_widget(
        Paragraph::new(caption)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(" Sphere ")),
        caption_area,
    );
}

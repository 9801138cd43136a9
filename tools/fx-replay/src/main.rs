//! # FX Replay
//!
//! 事件回放工具 - 按时间线把事件喂给 HUD，逐帧推进并输出统计。
//!
//! ## 用法
//!
//! ```bash
//! cargo run -p fx-replay -- run trace.json
//! cargo run -p fx-replay -- run trace.json --config hud.json --fps 144 --every 10
//! cargo run -p fx-replay -- check trace.json
//! cargo run -p fx-replay -- default-config hud.json
//! ```
//!
//! ## 时间线格式
//!
//! JSON 数组，每一项为事件或暂停切换：
//!
//! ```json
//! [
//!   { "at_ms": 0, "event": { "category": "damage_dealt", "magnitude": 10, "correlation_id": "e1" } },
//!   { "at_ms": 120, "pause": true },
//!   { "at_ms": 900, "pause": false }
//! ]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use fx_runtime::{EffectEvent, FxEvent};
use hud::{EventBus, Hud, HudConfig, HudStats};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 最后一条记录之后最多再推进的时长（毫秒）
const SETTLE_LIMIT_MS: f64 = 30_000.0;

#[derive(Parser)]
#[command(name = "fx-replay")]
#[command(about = "事件回放工具 - 按时间线把事件喂给 HUD 并输出统计")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 回放时间线
    Run {
        /// 时间线文件
        trace: PathBuf,

        /// HUD 配置文件（不指定时使用默认配置）
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 帧率（默认：60）
        #[arg(long, default_value = "60")]
        fps: u32,

        /// 每隔多少帧输出一次统计（默认：30）
        #[arg(long, default_value = "30")]
        every: u32,
    },

    /// 校验时间线中的事件
    Check {
        /// 时间线文件
        trace: PathBuf,
    },

    /// 写出默认 HUD 配置
    DefaultConfig {
        /// 输出路径
        output: PathBuf,
    },
}

/// 时间线条目
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum TraceEntry {
    Event { at_ms: f64, event: FxEvent },
    Pause { at_ms: f64, pause: bool },
}

impl TraceEntry {
    fn at_ms(&self) -> f64 {
        match self {
            TraceEntry::Event { at_ms, .. } | TraceEntry::Pause { at_ms, .. } => *at_ms,
        }
    }
}

/// 输出的一行统计
#[derive(Debug, Serialize)]
struct StatsLine<'a> {
    frame: u64,
    t_ms: f64,
    paused: bool,
    stats: &'a HudStats,
}

/// 回放结果汇总
#[derive(Debug, Default, Serialize)]
struct Summary {
    frames: u64,
    duration_ms: f64,
    started: u64,
    stacked: u64,
    completed: u64,
    evicted: u64,
    dropped: u64,
    cancelled: u64,
}

fn main() -> anyhow::Result<()> {
    hud::init_tracing("info");
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            trace,
            config,
            fps,
            every,
        } => {
            let config = match config {
                Some(path) => HudConfig::try_load(&path)
                    .with_context(|| format!("读取配置失败: {}", path.display()))?,
                None => HudConfig::default(),
            };
            let entries = load_trace(&trace)?;
            let summary = replay(&config, &entries, fps, every)?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Commands::Check { trace } => {
            let entries = load_trace(&trace)?;
            let invalid = check(&entries);
            if invalid > 0 {
                bail!("{invalid} 个事件校验失败");
            }
            info!(entries = entries.len(), "时间线校验通过");
        }
        Commands::DefaultConfig { output } => {
            HudConfig::default()
                .save(&output)
                .with_context(|| format!("写入配置失败: {}", output.display()))?;
            info!(path = %output.display(), "已写出默认配置");
        }
    }
    Ok(())
}

/// 读取时间线并按时间排序（同一时间保持文件顺序）
fn load_trace(path: &Path) -> anyhow::Result<Vec<TraceEntry>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("读取时间线失败: {}", path.display()))?;
    let mut entries = parse_trace(&content)?;
    if let Some(bad) = entries.iter().find(|e| !(e.at_ms().is_finite() && e.at_ms() >= 0.0)) {
        bail!("非法时间戳: {}", bad.at_ms());
    }
    entries.sort_by(|a, b| a.at_ms().total_cmp(&b.at_ms()));
    Ok(entries)
}

fn parse_trace(content: &str) -> anyhow::Result<Vec<TraceEntry>> {
    serde_json::from_str(content).context("时间线格式错误")
}

fn check(entries: &[TraceEntry]) -> usize {
    let mut invalid = 0;
    for (index, entry) in entries.iter().enumerate() {
        if let TraceEntry::Event { at_ms, event } = entry
            && let Err(e) = event.validate()
        {
            warn!(index, at_ms, error = %e, "事件非法");
            invalid += 1;
        }
    }
    invalid
}

fn replay(
    config: &HudConfig,
    entries: &[TraceEntry],
    fps: u32,
    every: u32,
) -> anyhow::Result<Summary> {
    if fps == 0 {
        bail!("fps 必须大于 0");
    }
    let frame_ms = 1000.0 / f64::from(fps);
    let every = u64::from(every.max(1));

    let bus = EventBus::new();
    let publisher = bus.publisher();
    let mut hud = Hud::new(config, Box::new(bus))?;

    let end_ms = entries.last().map_or(0.0, TraceEntry::at_ms);
    let mut summary = Summary::default();
    let mut cursor = 0;
    let mut now_ms = 0.0;

    info!(entries = entries.len(), fps, "开始回放");
    loop {
        while let Some(entry) = entries.get(cursor)
            && entry.at_ms() <= now_ms
        {
            match entry {
                TraceEntry::Event { event, .. } => publisher.publish(event.clone()),
                TraceEntry::Pause { pause: true, .. } => hud.pause_all(),
                TraceEntry::Pause { pause: false, .. } => hud.resume_all(),
            }
            cursor += 1;
        }

        for widget_event in hud.tick(frame_ms) {
            summary.record(&widget_event.event);
        }
        summary.frames += 1;
        now_ms += frame_ms;

        let stats = hud.stats();
        if summary.frames % every == 0 {
            let line = StatsLine {
                frame: summary.frames,
                t_ms: now_ms,
                paused: hud.is_paused(),
                stats: &stats,
            };
            println!("{}", serde_json::to_string(&line)?);
        }

        let finished = cursor >= entries.len() && now_ms >= end_ms;
        if finished && !hud.is_paused() && is_idle(&stats) {
            break;
        }
        if now_ms > end_ms + SETTLE_LIMIT_MS {
            warn!(now_ms, "超过收尾时限，提前结束");
            break;
        }
    }

    summary.duration_ms = now_ms;
    hud.dispose();
    info!(frames = summary.frames, "回放结束");
    Ok(summary)
}

fn is_idle(stats: &HudStats) -> bool {
    stats
        .widgets
        .values()
        .all(|s| s.active_count == 0 && s.queued_count == 0)
}

impl Summary {
    fn record(&mut self, event: &EffectEvent) {
        match event {
            EffectEvent::Started(_) => self.started += 1,
            EffectEvent::Stacked { .. } => self.stacked += 1,
            EffectEvent::Completed(_) => self.completed += 1,
            EffectEvent::Cancelled(_) => self.cancelled += 1,
            EffectEvent::Evicted(_) => self.evicted += 1,
            EffectEvent::Dropped(_) => self.dropped += 1,
        }
    }
}

//! Hive - 对话式智能体内核
//!
//! 入口：初始化日志、加载配置、启动内核 actor，并运行一个按行读取 stdin 的演示循环。
//! 以 `/` 开头的行是管理命令：/ps、/suspend <pid>、/resume <pid>、/close <pid>、/quit。

use anyhow::Context;
use hive::config::{load_config, KernelConfig};
use hive::core::{spawn_kernel, KernelHandle, Session};
use hive::interpreter::Response;
use hive::llm::create_llm_from_config;
use hive::observability;
use hive::protocols::builtin_protocols;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        KernelConfig::default()
    });

    let llm = create_llm_from_config(&cfg);
    let session = Session::from_config(&cfg, llm, builtin_protocols())
        .context("Failed to build session")?;

    tokio::spawn(observability::log_runtime_events(session.runtime().subscribe()));

    let (handle, join) = spawn_kernel(session);
    println!(
        "{} ready. Type a message, or /quit to exit.",
        cfg.app.name.as_deref().unwrap_or("hive")
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            if !run_command(&handle, command).await {
                break;
            }
            continue;
        }
        match handle.submit(line).await {
            Ok(responses) => responses.iter().for_each(print_response),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    handle.quit();
    join.await.context("Kernel task panicked")?;
    Ok(())
}

fn print_response(resp: &Response) {
    match resp {
        Response::Direct { text } => println!("{}", text),
        Response::Thought { text } => println!("(thought) {}", text),
        Response::Log { text } => println!("[log] {}", text),
        Response::ActionProposal { proposal } => {
            println!("-> {} [{}]", proposal.handle(), proposal.display.as_str())
        }
    }
}

/// 返回 false 表示退出
async fn run_command(handle: &KernelHandle, command: &str) -> bool {
    let (name, arg) = command
        .split_once(' ')
        .map(|(n, a)| (n, a.trim()))
        .unwrap_or((command, ""));
    let result = match name {
        "quit" | "exit" => return false,
        "ps" => handle.describe_processes().await.map(|procs| {
            if procs.is_empty() {
                println!("no processes");
            }
            for (pid, desc) in procs {
                println!("{}  {}", pid, desc);
            }
        }),
        "suspend" => handle
            .suspend(arg)
            .await
            .map(|done| println!("suspended: {}", done)),
        "resume" => handle.resume(arg).await.map(|_| println!("resumed")),
        "close" => handle.close(arg).await.map(|_| println!("closed")),
        other => {
            println!("unknown command: /{}", other);
            Ok(())
        }
    };
    if let Err(e) = result {
        eprintln!("error: {}", e);
    }
    true
}

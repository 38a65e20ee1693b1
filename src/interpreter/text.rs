//! TEXT 策略：基于完整历史流式生成一条直接回复

use async_trait::async_trait;

use crate::core::KernelError;
use crate::interpreter::{Response, Step, Strategy, StrategyRun, TurnContext, TurnInput, TEXT};

pub struct TextStrategy;

impl Strategy for TextStrategy {
    fn name(&self) -> &str {
        TEXT
    }

    fn description(&self) -> &str {
        "Respond directly with text, without using any action."
    }

    fn start(&self) -> Box<dyn StrategyRun> {
        Box::new(TextRun { answered: false })
    }
}

struct TextRun {
    answered: bool,
}

#[async_trait]
impl StrategyRun for TextRun {
    async fn step(&mut self, ctx: &TurnContext, input: &TurnInput) -> Result<Step, KernelError> {
        if self.answered {
            return Ok(Step::Done);
        }
        let text = ctx.stream_text(input).await?;
        self.answered = true;
        Ok(Step::Yield(Response::Direct { text }))
    }
}

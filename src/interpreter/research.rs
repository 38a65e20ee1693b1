//! RESEARCH 策略：先生成动作提案并逐个交给调用方分发，再基于更新后的历史给出直接回复

use std::collections::VecDeque;

use async_trait::async_trait;

use crate::core::KernelError;
use crate::interpreter::{
    generate_proposals, Response, Step, Strategy, StrategyRun, TurnContext, TurnInput, RESEARCH,
};
use crate::protocols::ActionProposal;

pub struct ResearchStrategy;

impl Strategy for ResearchStrategy {
    fn name(&self) -> &str {
        RESEARCH
    }

    fn description(&self) -> &str {
        "Invoke one or more of the available actions first, then respond using their results."
    }

    fn start(&self) -> Box<dyn StrategyRun> {
        Box::new(ResearchRun {
            phase: Phase::Propose,
        })
    }
}

enum Phase {
    Propose,
    Dispatching(VecDeque<ActionProposal>),
    Respond,
    Finished,
}

struct ResearchRun {
    phase: Phase,
}

#[async_trait]
impl StrategyRun for ResearchRun {
    async fn step(&mut self, ctx: &TurnContext, input: &TurnInput) -> Result<Step, KernelError> {
        loop {
            match &mut self.phase {
                Phase::Propose => {
                    let proposals = generate_proposals(ctx, input).await?;
                    let summary = proposals
                        .iter()
                        .map(|p| p.handle().encode())
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.phase = Phase::Dispatching(proposals.into());
                    if ctx.emit_logs {
                        return Ok(Step::Yield(Response::Log {
                            text: format!("proposed actions: {}", summary),
                        }));
                    }
                }
                Phase::Dispatching(queue) => match queue.pop_front() {
                    Some(proposal) => return Ok(Step::Yield(Response::ActionProposal { proposal })),
                    None => self.phase = Phase::Respond,
                },
                Phase::Respond => {
                    let text = ctx.stream_text(input).await?;
                    self.phase = Phase::Finished;
                    return Ok(Step::Yield(Response::Direct { text }));
                }
                Phase::Finished => return Ok(Step::Done),
            }
        }
    }
}

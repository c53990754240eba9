//! Review-classes modal: subject selection, slides, quiz, summary

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::content::{find_subject, Slide, Subject, SUBJECTS};
use super::narration::{NarrationDriver, NarrationOutcome};
use crate::error::{AssistantError, AssistantResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PopupStage {
    SelectingSubject,
    Slides {
        subject: &'static Subject,
        index: usize,
    },
    Quiz {
        subject: &'static Subject,
        question: usize,
        correct: usize,
    },
    Summary {
        subject: &'static Subject,
        correct: usize,
        total: usize,
    },
    Closed,
}

impl PopupStage {
    pub fn name(&self) -> &'static str {
        match self {
            PopupStage::SelectingSubject => "selecting_subject",
            PopupStage::Slides { .. } => "slides",
            PopupStage::Quiz { .. } => "quiz",
            PopupStage::Summary { .. } => "summary",
            PopupStage::Closed => "closed",
        }
    }
}

/// What the modal renders after a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum PopupView {
    Subjects {
        subjects: Vec<(&'static str, &'static str)>,
    },
    Slide {
        subject: &'static str,
        index: usize,
        total: usize,
        slide: &'static Slide,
    },
    Question {
        subject: &'static str,
        number: usize,
        total: usize,
        prompt: &'static str,
        options: &'static [&'static str],
    },
    Summary {
        subject: &'static str,
        correct: usize,
        total: usize,
    },
    Closed,
}

impl PopupView {
    /// Text to narrate when this view appears
    pub fn narration(&self) -> Option<&'static str> {
        match self {
            PopupView::Slide { slide, .. } => Some(slide.narration),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerFeedback {
    pub correct: bool,
    pub answer: &'static str,
    pub explanation: &'static str,
    pub next: PopupView,
}

/// Pure modal state; audio is driven by [`ReviewClasses`]
#[derive(Debug, Clone)]
pub struct ReviewClassesPopup {
    stage: PopupStage,
}

impl Default for ReviewClassesPopup {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewClassesPopup {
    pub fn new() -> Self {
        Self {
            stage: PopupStage::SelectingSubject,
        }
    }

    pub fn stage(&self) -> &PopupStage {
        &self.stage
    }

    pub fn subjects() -> Vec<(&'static str, &'static str)> {
        SUBJECTS.iter().map(|s| (s.id, s.name)).collect()
    }

    fn invalid(&self, event: &str) -> AssistantError {
        AssistantError::UnknownAction(format!("{} while {}", event, self.stage.name()))
    }

    fn slide_view(subject: &'static Subject, index: usize) -> PopupView {
        PopupView::Slide {
            subject: subject.name,
            index,
            total: subject.slides.len(),
            slide: &subject.slides[index],
        }
    }

    fn question_view(subject: &'static Subject, question: usize) -> PopupView {
        let q = &subject.quiz[question];
        PopupView::Question {
            subject: subject.name,
            number: question + 1,
            total: subject.quiz.len(),
            prompt: q.prompt,
            options: q.options,
        }
    }

    /// Current view without changing state
    pub fn view(&self) -> PopupView {
        match &self.stage {
            PopupStage::SelectingSubject => PopupView::Subjects {
                subjects: Self::subjects(),
            },
            PopupStage::Slides { subject, index } => Self::slide_view(subject, *index),
            PopupStage::Quiz {
                subject, question, ..
            } => Self::question_view(subject, *question),
            PopupStage::Summary {
                subject,
                correct,
                total,
            } => PopupView::Summary {
                subject: subject.name,
                correct: *correct,
                total: *total,
            },
            PopupStage::Closed => PopupView::Closed,
        }
    }

    pub fn select_subject(&mut self, id: &str) -> AssistantResult<PopupView> {
        if self.stage != PopupStage::SelectingSubject {
            return Err(self.invalid("select_subject"));
        }
        let subject = find_subject(id)
            .ok_or_else(|| AssistantError::UnknownAction(format!("unknown subject '{}'", id)))?;
        info!(subject = subject.id, "Review subject selected");
        self.stage = PopupStage::Slides { subject, index: 0 };
        Ok(self.view())
    }

    /// Advance a slide; past the last slide the quiz starts
    pub fn next_slide(&mut self) -> AssistantResult<PopupView> {
        let PopupStage::Slides { subject, index } = self.stage else {
            return Err(self.invalid("next_slide"));
        };
        self.stage = if index + 1 < subject.slides.len() {
            PopupStage::Slides {
                subject,
                index: index + 1,
            }
        } else {
            debug!(subject = subject.id, "Slides done, starting quiz");
            PopupStage::Quiz {
                subject,
                question: 0,
                correct: 0,
            }
        };
        Ok(self.view())
    }

    /// Step back one slide; stays on the first slide
    pub fn previous_slide(&mut self) -> AssistantResult<PopupView> {
        let PopupStage::Slides { subject, index } = self.stage else {
            return Err(self.invalid("previous_slide"));
        };
        self.stage = PopupStage::Slides {
            subject,
            index: index.saturating_sub(1),
        };
        Ok(self.view())
    }

    /// Answer the current question. Each question takes exactly one answer.
    pub fn answer(&mut self, choice: usize) -> AssistantResult<AnswerFeedback> {
        let PopupStage::Quiz {
            subject,
            question,
            correct,
        } = self.stage
        else {
            return Err(self.invalid("answer"));
        };
        let q = &subject.quiz[question];
        if choice >= q.options.len() {
            return Err(AssistantError::UnknownAction(format!(
                "option {} out of range",
                choice
            )));
        }

        let is_correct = choice == q.answer;
        let correct = correct + usize::from(is_correct);
        self.stage = if question + 1 < subject.quiz.len() {
            PopupStage::Quiz {
                subject,
                question: question + 1,
                correct,
            }
        } else {
            info!(subject = subject.id, correct, total = subject.quiz.len(), "Quiz finished");
            PopupStage::Summary {
                subject,
                correct,
                total: subject.quiz.len(),
            }
        };

        Ok(AnswerFeedback {
            correct: is_correct,
            answer: q.options[q.answer],
            explanation: q.explanation,
            next: self.view(),
        })
    }

    /// Back to subject selection from the summary
    pub fn restart(&mut self) -> AssistantResult<PopupView> {
        if !matches!(self.stage, PopupStage::Summary { .. }) {
            return Err(self.invalid("restart"));
        }
        self.stage = PopupStage::SelectingSubject;
        Ok(self.view())
    }

    pub fn close(&mut self) {
        self.stage = PopupStage::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.stage == PopupStage::Closed
    }
}

/// The modal wired to narration: every slide change narrates the slide,
/// leaving slides stops audio, closing stops audio.
pub struct ReviewClasses {
    popup: ReviewClassesPopup,
    narration: Arc<NarrationDriver>,
}

impl ReviewClasses {
    pub fn open(narration: Arc<NarrationDriver>) -> Self {
        Self {
            popup: ReviewClassesPopup::new(),
            narration,
        }
    }

    pub fn popup(&self) -> &ReviewClassesPopup {
        &self.popup
    }

    pub fn narration(&self) -> &NarrationDriver {
        &self.narration
    }

    async fn narrate_view(&self, view: &PopupView) -> AssistantResult<Option<NarrationOutcome>> {
        match view.narration() {
            Some(text) => self.narration.narrate(text).await.map(Some),
            None => {
                self.narration.stop()?;
                Ok(None)
            }
        }
    }

    pub async fn select_subject(
        &mut self,
        id: &str,
    ) -> AssistantResult<(PopupView, Option<NarrationOutcome>)> {
        let view = self.popup.select_subject(id)?;
        let outcome = self.narrate_view(&view).await?;
        Ok((view, outcome))
    }

    pub async fn next_slide(&mut self) -> AssistantResult<(PopupView, Option<NarrationOutcome>)> {
        let view = self.popup.next_slide()?;
        let outcome = self.narrate_view(&view).await?;
        Ok((view, outcome))
    }

    pub async fn previous_slide(
        &mut self,
    ) -> AssistantResult<(PopupView, Option<NarrationOutcome>)> {
        let view = self.popup.previous_slide()?;
        let outcome = self.narrate_view(&view).await?;
        Ok((view, outcome))
    }

    pub fn answer(&mut self, choice: usize) -> AssistantResult<AnswerFeedback> {
        self.popup.answer(choice)
    }

    pub fn restart(&mut self) -> AssistantResult<PopupView> {
        self.popup.restart()
    }

    pub fn close(&mut self) -> AssistantResult<()> {
        self.popup.close();
        self.narration.stop()
    }
}

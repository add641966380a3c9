//! MOC content synthesis through an injected text generator

mod generator;
mod synthesizer;

pub use generator::{
    GenerationError, GenerationResult, GeneratorCommand, MockGenerator, SubprocessGenerator, TextGenerator,
};
pub use synthesizer::{NodeSynthesizer, SectionContent, Synthesis, SynthesisOutcome};

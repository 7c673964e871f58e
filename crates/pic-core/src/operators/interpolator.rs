//! Second-order field gathering.

use crate::stage::{StageContext, StageError, StageKind, StageOperator, StageScratch};
use crate::store::ParticleChunkMut;
use std::ops::Range;

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldInterpolator;

impl StageOperator for FieldInterpolator {
    fn kind(&self) -> StageKind {
        StageKind::Interpolate
    }

    fn apply(
        &self,
        ctx: &StageContext<'_>,
        particles: &mut ParticleChunkMut<'_>,
        range: Range<usize>,
        scratch: &mut StageScratch,
    ) -> Result<(), StageError> {
        for i in range {
            if !particles.is_active(i) {
                continue;
            }
            let d = ctx.assigner.distances(&particles.position(i));
            let (e, b) = ctx.fields.interpolate(&d).ok_or_else(|| {
                StageError::new(format!(
                    "particle {} lies outside the field grid",
                    particles.offset() + i
                ))
            })?;
            scratch.fields.e[i] = e;
            scratch.fields.b[i] = b;
        }
        Ok(())
    }
}

/// Position of one frame within the skip cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTick {
    pub number: u64,
    pub scheduled: bool,
}

/// Process-wide frame counter gating detection and motor commands to every
/// Nth frame.
///
/// Frame numbers start at 0, so the first frame is always scheduled.
#[derive(Debug)]
pub struct FrameSchedule {
    skip_interval: u64,
    frame_count: u64,
}

impl FrameSchedule {
    pub fn new(skip_interval: u64) -> Result<Self, &'static str> {
        if skip_interval < 1 {
            return Err("skip_interval must be >= 1");
        }
        Ok(Self {
            skip_interval,
            frame_count: 0,
        })
    }

    pub fn skip_interval(&self) -> u64 {
        self.skip_interval
    }

    #[cfg(test)]
    pub(crate) fn frames_seen(&self) -> u64 {
        self.frame_count
    }

    pub fn is_scheduled(&self, frame_number: u64) -> bool {
        frame_number % self.skip_interval == 0
    }

    /// Counts one frame and reports whether it falls on the cadence.
    pub fn tick(&mut self) -> FrameTick {
        let number = self.frame_count;
        self.frame_count += 1;
        FrameTick {
            number,
            scheduled: self.is_scheduled(number),
        }
    }
}

use crate::{HalResult, UbiControl};
use std::ops::{Deref, DerefMut};

/// RAII guard that detaches an attached UBI device when dropped.
///
/// The guard owns the control handle so every exit path (early return, error, normal
/// completion) detaches exactly once. Use [`UbiAttachGuard::finish`] to observe the
/// detach result instead of only logging it.
pub struct UbiAttachGuard<'a> {
    ctrl: Box<dyn UbiControl + 'a>,
    mtd_num: u32,
    dev_num: u32,
    active: bool,
}

impl<'a> UbiAttachGuard<'a> {
    pub fn new(ctrl: Box<dyn UbiControl + 'a>, mtd_num: u32, dev_num: u32) -> Self {
        Self {
            ctrl,
            mtd_num,
            dev_num,
            active: true,
        }
    }

    pub fn dev_num(&self) -> u32 {
        self.dev_num
    }

    pub fn mtd_num(&self) -> u32 {
        self.mtd_num
    }

    /// Detach now and report the outcome.
    pub fn finish(mut self) -> HalResult<()> {
        self.active = false;
        self.ctrl.detach_mtd(self.mtd_num)
    }
}

impl<'a> Deref for UbiAttachGuard<'a> {
    type Target = dyn UbiControl + 'a;

    fn deref(&self) -> &Self::Target {
        self.ctrl.as_ref()
    }
}

impl<'a> DerefMut for UbiAttachGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctrl.as_mut()
    }
}

impl Drop for UbiAttachGuard<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(err) = self.ctrl.detach_mtd(self.mtd_num) {
            log::warn!(
                "ubi guard failed to detach mtd{} (ubi{}): {}",
                self.mtd_num,
                self.dev_num,
                err
            );
        }
    }
}

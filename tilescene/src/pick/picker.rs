//! Pending pick requests and the deferred read-back.

use std::collections::BTreeMap;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::worker::Feature;

/// Errors from the pick protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickError {
    /// A reply named a request that is not pending. This is a logic defect.
    #[error("No pending pick request with id {0}")]
    UnknownRequest(u64),

    /// The scene shut down before the request resolved.
    #[error("Pick request cancelled")]
    Cancelled,
}

/// Outcome of a pick request.
#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    pub request_id: u64,

    /// Feature under the pixel, if any.
    pub feature: Option<Feature>,

    /// Whether the selection differs from the previous resolution.
    pub changed: bool,
}

/// Caller's side of a pick request.
#[derive(Debug)]
pub struct PickHandle {
    request_id: u64,
    rx: oneshot::Receiver<Result<PickResult, PickError>>,
}

impl PickHandle {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub async fn wait(self) -> Result<PickResult, PickError> {
        self.rx.await.unwrap_or(Err(PickError::Cancelled))
    }

    /// Returns the outcome if it is already known.
    pub fn try_result(&mut self) -> Option<Result<PickResult, PickError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(PickError::Cancelled)),
        }
    }
}

/// A point in device pixels, origin at the bottom left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevicePoint {
    pub x: f64,
    pub y: f64,
}

impl DevicePoint {
    /// Converts a CSS pixel (origin top left) into device space.
    pub fn from_css(x: f64, y: f64, device_pixel_ratio: f64, device_height: f64) -> Self {
        Self {
            x: x * device_pixel_ratio,
            y: device_height - y * device_pixel_ratio,
        }
    }

    /// Scales the point into a pick buffer of `buffer` size, clamped to its edges.
    pub fn to_buffer(&self, device: (u32, u32), buffer: (u32, u32)) -> (u32, u32) {
        let scale = |v: f64, from: u32, to: u32| -> u32 {
            if from == 0 || to == 0 {
                return 0;
            }
            let px = (v * to as f64 / from as f64).floor();
            px.clamp(0.0, (to - 1) as f64) as u32
        };
        (
            scale(self.x, device.0, buffer.0),
            scale(self.y, device.1, buffer.1),
        )
    }
}

#[derive(Debug)]
struct SelectionRequest {
    point: DevicePoint,
    /// Forwarded to a worker; awaiting its reply.
    sent: bool,
    completion: oneshot::Sender<Result<PickResult, PickError>>,
}

/// Tracks pick requests from submission to resolution.
///
/// Every request id is removed exactly once, when its handle is resolved.
#[derive(Debug)]
pub struct SelectionPicker {
    requests: BTreeMap<u64, SelectionRequest>,
    next_id: u64,
    selected: Option<Feature>,
    frame_delay: u64,
    /// Tick at which the pick buffer may be read.
    readback_due: Option<u64>,
    /// Highest request id drawn into the pick buffer by the last pass.
    drawn_through: Option<u64>,
}

impl SelectionPicker {
    pub fn new(frame_delay: u64) -> Self {
        Self {
            requests: BTreeMap::new(),
            next_id: 0,
            selected: None,
            frame_delay,
            readback_due: None,
            drawn_through: None,
        }
    }

    /// Queues a pick at `point` and returns its handle.
    pub fn request(&mut self, point: DevicePoint) -> PickHandle {
        let request_id = self.next_id;
        self.next_id += 1;

        let (tx, rx) = oneshot::channel();
        self.requests.insert(
            request_id,
            SelectionRequest {
                point,
                sent: false,
                completion: tx,
            },
        );
        trace!(request_id, x = point.x, y = point.y, "Pick requested");

        PickHandle { request_id, rx }
    }

    pub fn pending_len(&self) -> usize {
        self.requests.len()
    }

    /// Whether any request still needs a pick pass.
    pub fn has_unsent(&self) -> bool {
        self.requests.values().any(|r| !r.sent)
    }

    /// Whether a pick pass is needed: some unsent request was not covered by
    /// the pass whose read-back is pending.
    ///
    /// Redrawing for covered requests would push the read-back out again on
    /// every animated frame.
    pub fn needs_pick_pass(&self) -> bool {
        let covered = self.readback_due.and(self.drawn_through);
        self.requests
            .iter()
            .any(|(id, r)| !r.sent && covered.map_or(true, |drawn| *id > drawn))
    }

    /// Most recently resolved selection.
    pub fn selected(&self) -> Option<&Feature> {
        self.selected.as_ref()
    }

    /// Schedules the read-back after a pick pass rendered at `tick`.
    ///
    /// Replaces any read-back still pending.
    pub fn schedule_readback(&mut self, tick: u64) {
        self.drawn_through = self.requests.keys().next_back().copied();
        let due = tick + self.frame_delay;
        if let Some(previous) = self.readback_due.replace(due) {
            trace!(previous, due, "Pending read-back replaced");
        }
    }

    pub fn readback_due(&self) -> Option<u64> {
        self.readback_due
    }

    /// Returns true, once, when the scheduled read-back is due at `tick`.
    pub fn take_due_readback(&mut self, tick: u64) -> bool {
        match self.readback_due {
            Some(due) if due <= tick => {
                self.readback_due = None;
                true
            }
            _ => false,
        }
    }

    /// Requests not yet forwarded, in id order.
    pub fn unsent_requests(&self) -> Vec<(u64, DevicePoint)> {
        self.requests
            .iter()
            .filter(|(_, r)| !r.sent)
            .map(|(id, r)| (*id, r.point))
            .collect()
    }

    pub fn mark_sent(&mut self, request_id: u64) {
        if let Some(request) = self.requests.get_mut(&request_id) {
            request.sent = true;
        }
    }

    /// Resolves a request and removes it. Returns the `changed` flag.
    pub fn resolve(&mut self, request_id: u64, feature: Option<Feature>) -> Result<bool, PickError> {
        let request = self
            .requests
            .remove(&request_id)
            .ok_or(PickError::UnknownRequest(request_id))?;

        let changed = match (&self.selected, &feature) {
            (None, None) => false,
            (Some(previous), Some(current)) => previous.id != current.id,
            _ => true,
        };
        self.selected = feature.clone();

        debug!(
            request_id,
            found = feature.is_some(),
            changed,
            "Pick resolved"
        );

        let _ = request.completion.send(Ok(PickResult {
            request_id,
            feature,
            changed,
        }));
        Ok(changed)
    }

    /// Rejects every pending request.
    pub fn cancel_all(&mut self) {
        for (_, request) in std::mem::take(&mut self.requests) {
            let _ = request.completion.send(Err(PickError::Cancelled));
        }
        self.readback_due = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> DevicePoint {
        DevicePoint { x: 10.0, y: 10.0 }
    }

    #[test]
    fn test_ids_increase() {
        let mut picker = SelectionPicker::new(5);
        let a = picker.request(point());
        let b = picker.request(point());
        assert!(b.request_id() > a.request_id());
        assert_eq!(picker.pending_len(), 2);
    }

    #[test]
    fn test_resolve_exactly_once() {
        let mut picker = SelectionPicker::new(5);
        let mut handle = picker.request(point());
        let id = handle.request_id();

        assert!(picker.resolve(id, None).is_ok());
        assert_eq!(picker.resolve(id, None), Err(PickError::UnknownRequest(id)));

        let result = handle.try_result().unwrap().unwrap();
        assert!(result.feature.is_none());
        assert_eq!(picker.pending_len(), 0);
    }

    #[test]
    fn test_change_detection() {
        let mut picker = SelectionPicker::new(5);
        let feature = Feature::new(42, "pois");

        let mut first = picker.request(point());
        picker
            .resolve(first.request_id(), Some(feature.clone()))
            .unwrap();
        assert!(first.try_result().unwrap().unwrap().changed);

        let mut same = picker.request(point());
        picker.resolve(same.request_id(), Some(feature)).unwrap();
        assert!(!same.try_result().unwrap().unwrap().changed);

        let other = picker.request(point());
        assert!(picker
            .resolve(other.request_id(), Some(Feature::new(7, "pois")))
            .unwrap());

        let empty = picker.request(point());
        assert!(picker.resolve(empty.request_id(), None).unwrap());
        let still_empty = picker.request(point());
        assert!(!picker.resolve(still_empty.request_id(), None).unwrap());
    }

    #[test]
    fn test_readback_is_replaced_not_stacked() {
        let mut picker = SelectionPicker::new(5);
        picker.schedule_readback(10);
        picker.schedule_readback(12);
        assert_eq!(picker.readback_due(), Some(17));

        assert!(!picker.take_due_readback(15));
        assert!(picker.take_due_readback(17));
        assert!(!picker.take_due_readback(18));
    }

    #[test]
    fn test_pending_readback_covers_drawn_requests() {
        let mut picker = SelectionPicker::new(5);
        picker.request(point());
        assert!(picker.needs_pick_pass());

        picker.schedule_readback(1);
        assert!(!picker.needs_pick_pass());
        assert!(picker.has_unsent());

        // A newer request needs its own pass
        picker.request(point());
        assert!(picker.needs_pick_pass());
        picker.schedule_readback(3);
        assert!(!picker.needs_pick_pass());
        assert_eq!(picker.readback_due(), Some(8));

        assert!(picker.take_due_readback(8));
        assert!(picker.needs_pick_pass());
    }

    #[test]
    fn test_sent_requests_are_not_resent() {
        let mut picker = SelectionPicker::new(5);
        let a = picker.request(point());
        let b = picker.request(point());
        picker.mark_sent(a.request_id());

        let unsent: Vec<u64> = picker.unsent_requests().iter().map(|(id, _)| *id).collect();
        assert_eq!(unsent, vec![b.request_id()]);
        assert!(picker.has_unsent());

        picker.mark_sent(b.request_id());
        assert!(!picker.has_unsent());
        assert_eq!(picker.pending_len(), 2);
    }

    #[test]
    fn test_cancel_all() {
        let mut picker = SelectionPicker::new(5);
        let mut handle = picker.request(point());
        picker.schedule_readback(1);
        picker.cancel_all();

        assert_eq!(handle.try_result(), Some(Err(PickError::Cancelled)));
        assert_eq!(picker.readback_due(), None);
    }

    #[test]
    fn test_device_point_mapping() {
        let p = DevicePoint::from_css(100.0, 50.0, 2.0, 600.0);
        assert_eq!(p, DevicePoint { x: 200.0, y: 500.0 });
        assert_eq!(p.to_buffer((800, 600), (256, 256)), (64, 213));
        let edge = DevicePoint { x: 800.0, y: 600.0 };
        assert_eq!(edge.to_buffer((800, 600), (256, 256)), (255, 255));
    }
}

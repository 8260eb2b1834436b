//! In-memory backend for exercising the meshing pipeline without a GPU.
//!
//! Each submitted job adds the next scripted vertex count to a modelled
//! counter, the way the extraction kernel's atomic increments would. Pending
//! completions resolve on the next `poll` unless completions are held, and the
//! oldest one can be made to fail instead.

use std::collections::VecDeque;

use crate::engine_state::rendering::{meshing::MeshingError, vertex::vertex_bytes};

use super::{completion, Completion, CompletionSignal, GpuBackend};

/// Device call observed by the recording backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    ResetCounter,
    SubmitJob(String),
    ReadCount(u32),
    CreateBuffer { id: u64, size: u64 },
    CopyVertices { id: u64, vertex_count: u32 },
    Release(u64),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub id: u64,
    pub size: u64,
}

pub struct RecordedStaging {
    counter_snapshot: u32,
}

pub struct RecordingBackend {
    capacity: u32,
    scripted_counts: VecDeque<u32>,
    counter: u32,
    pending: Vec<CompletionSignal<()>>,
    hold_completions: bool,
    reject_next: Option<String>,
    lost: Option<String>,
    next_buffer_id: u64,
    pub calls: Vec<BackendCall>,
}

impl RecordingBackend {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            scripted_counts: VecDeque::new(),
            counter: 0,
            pending: Vec::new(),
            hold_completions: false,
            reject_next: None,
            lost: None,
            next_buffer_id: 1,
            calls: Vec::new(),
        }
    }

    /// Queues the vertex counts the next jobs will produce. Unscripted jobs produce none.
    pub fn script_vertex_counts(&mut self, counts: impl IntoIterator<Item = u32>) {
        self.scripted_counts.extend(counts);
    }

    /// While held, submitted work never completes.
    pub fn hold_completions(&mut self, hold: bool) {
        self.hold_completions = hold;
    }

    /// The oldest pending completion fails with `DeviceUnavailable(reason)`
    /// on the next poll that releases completions.
    pub fn reject_next_completion(&mut self, reason: &str) {
        self.reject_next = Some(reason.to_string());
    }

    pub fn lose_device(&mut self, reason: &str) {
        self.lost = Some(reason.to_string());
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn pending_operations(&self) -> usize {
        self.pending.len()
    }

    pub fn released(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Release(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn submitted_jobs(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::SubmitJob(label) => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    fn track(&mut self) -> Completion<()> {
        let (pending, signal) = completion();
        self.pending.push(signal);
        pending
    }
}

impl GpuBackend for RecordingBackend {
    type Buffer = RecordedBuffer;
    type Staging = RecordedStaging;

    fn scratch_vertex_capacity(&self) -> u32 {
        self.capacity
    }

    fn reset_vertex_counter(&mut self) {
        self.counter = 0;
        self.calls.push(BackendCall::ResetCounter);
    }

    fn submit_meshing_job(&mut self, label: &str) -> (Self::Staging, Completion<()>) {
        self.counter += self.scripted_counts.pop_front().unwrap_or(0);
        self.calls.push(BackendCall::SubmitJob(label.to_string()));

        let staging = RecordedStaging {
            counter_snapshot: self.counter,
        };
        (staging, self.track())
    }

    fn read_vertex_count(&mut self, staging: Self::Staging) -> Result<u32, MeshingError> {
        self.calls
            .push(BackendCall::ReadCount(staging.counter_snapshot));
        Ok(staging.counter_snapshot)
    }

    fn create_vertex_buffer(&mut self, _label: &str, vertex_count: u32) -> Self::Buffer {
        let buffer = RecordedBuffer {
            id: self.next_buffer_id,
            size: vertex_bytes(vertex_count),
        };
        self.next_buffer_id += 1;
        self.calls.push(BackendCall::CreateBuffer {
            id: buffer.id,
            size: buffer.size,
        });
        buffer
    }

    fn submit_vertex_copy(&mut self, target: &Self::Buffer, vertex_count: u32) -> Completion<()> {
        self.calls.push(BackendCall::CopyVertices {
            id: target.id,
            vertex_count,
        });
        self.track()
    }

    fn buffer_size(&self, buffer: &Self::Buffer) -> u64 {
        buffer.size
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        self.calls.push(BackendCall::Release(buffer.id));
    }

    fn poll(&mut self) -> Result<(), MeshingError> {
        if let Some(reason) = &self.lost {
            return Err(MeshingError::DeviceUnavailable(reason.clone()));
        }

        if !self.hold_completions {
            for signal in self.pending.drain(..) {
                match self.reject_next.take() {
                    Some(reason) => signal.reject(MeshingError::DeviceUnavailable(reason)),
                    None => signal.resolve(()),
                }
            }
        }

        Ok(())
    }
}

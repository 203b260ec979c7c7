//! Per-controller activation state and receiver fan-out

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;
use tracing::{trace, warn};

use super::{AnyInput, ControllerInputType, Input, InputMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerId(pub u32);

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller#{}", self.0)
    }
}

/// Delivered to receivers on activation, already mapped into the receiver's namespace
#[derive(Debug, Clone, Copy)]
pub struct ActivationEvent<'a> {
    pub controller: ControllerId,
    pub input: &'a AnyInput,
    pub value: f64,
    /// Some sustained input on the controller maps to the same target
    pub sustained: bool,
}

/// Observer of controller input.
///
/// Callbacks run on the thread that changed the controller state, with the
/// controller's lock held. Implementations must not call back into the same
/// controller.
pub trait InputReceiver: Send + Sync {
    fn did_activate(&self, event: ActivationEvent<'_>);
    fn did_deactivate(&self, controller: ControllerId, input: &AnyInput);
}

type ReceiverList = SmallVec<[(Arc<dyn InputReceiver>, Option<Arc<dyn InputMapping>>); 4]>;

struct ReceiverEntry {
    receiver: Weak<dyn InputReceiver>,
    mapping: Option<Arc<dyn InputMapping>>,
}

struct Slot {
    generation: u32,
    entry: Option<ReceiverEntry>,
}

#[derive(Default)]
struct ControllerInner {
    activated: HashMap<AnyInput, f64>,
    sustained: HashSet<AnyInput>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    /// Live slot indices in registration order
    order: Vec<usize>,
}

impl ControllerInner {
    fn insert_receiver(&mut self, entry: ReceiverEntry) -> (usize, u32) {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.entry = Some(entry);
        self.order.push(index);
        (index, slot.generation)
    }

    fn remove_slot(&mut self, index: usize, generation: u32) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        if slot.generation != generation || slot.entry.is_none() {
            return false;
        }
        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.order.retain(|&i| i != index);
        true
    }

    fn find_receiver(&self, receiver: &Weak<dyn InputReceiver>) -> Option<usize> {
        self.order.iter().copied().find(|&index| {
            self.slots[index]
                .entry
                .as_ref()
                .is_some_and(|entry| Weak::ptr_eq(&entry.receiver, receiver))
        })
    }

    /// Upgrade live receivers in registration order, freeing slots whose receiver is gone
    fn live_receivers(&mut self) -> ReceiverList {
        let mut live = ReceiverList::new();
        let mut dead: SmallVec<[(usize, u32); 2]> = SmallVec::new();
        for &index in &self.order {
            let slot = &self.slots[index];
            if let Some(entry) = &slot.entry {
                match entry.receiver.upgrade() {
                    Some(receiver) => live.push((receiver, entry.mapping.clone())),
                    None => dead.push((index, slot.generation)),
                }
            }
        }
        for (index, generation) in dead {
            trace!("Pruning dropped receiver in slot {}", index);
            self.remove_slot(index, generation);
        }
        live
    }
}

fn map_input(mapping: &Option<Arc<dyn InputMapping>>, input: &AnyInput) -> Option<AnyInput> {
    match mapping {
        Some(mapping) => mapping.input_for(input),
        None => Some(input.clone()),
    }
}

struct ControllerShared {
    id: ControllerId,
    input_type: ControllerInputType,
    inner: Mutex<ControllerInner>,
}

impl ControllerShared {
    fn lock(&self) -> MutexGuard<'_, ControllerInner> {
        self.inner.lock().unwrap_or_else(|e| {
            warn!("{} state lock poisoned, recovering", self.id);
            e.into_inner()
        })
    }
}

/// Activation state of one physical controller, shared by cloning
#[derive(Clone)]
pub struct GameControllerState {
    shared: Arc<ControllerShared>,
}

impl GameControllerState {
    pub fn new(id: ControllerId, input_type: ControllerInputType) -> Self {
        Self {
            shared: Arc::new(ControllerShared {
                id,
                input_type,
                inner: Mutex::new(ControllerInner::default()),
            }),
        }
    }

    pub fn id(&self) -> ControllerId {
        self.shared.id
    }

    pub fn input_type(&self) -> &ControllerInputType {
        &self.shared.input_type
    }

    /// Register `receiver` with an optional per-receiver mapping.
    ///
    /// The controller only holds a weak reference. Registering the same
    /// receiver again replaces its mapping and returns a handle to the same
    /// registration; dropping any handle for it unregisters the receiver.
    pub fn add_receiver<R>(
        &self,
        receiver: &Arc<R>,
        mapping: Option<Arc<dyn InputMapping>>,
    ) -> ReceiverHandle
    where
        R: InputReceiver + 'static,
    {
        let weak: Weak<dyn InputReceiver> = Arc::downgrade(receiver) as Weak<R>;
        let mut inner = self.shared.lock();

        let (index, generation) = match inner.find_receiver(&weak) {
            Some(index) => {
                let slot = &mut inner.slots[index];
                if let Some(entry) = slot.entry.as_mut() {
                    entry.mapping = mapping;
                }
                (index, slot.generation)
            }
            None => inner.insert_receiver(ReceiverEntry {
                receiver: weak,
                mapping,
            }),
        };

        ReceiverHandle {
            controller: Arc::downgrade(&self.shared),
            index,
            generation,
        }
    }

    pub fn receivers_count(&self) -> usize {
        self.shared.lock().live_receivers().len()
    }

    pub fn activate<I: Input + ?Sized>(&self, input: &I) {
        self.activate_with_value(input, 1.0);
    }

    /// Record `input` as active and notify every receiver it maps for.
    ///
    /// Receivers are notified even when the input was already active; a
    /// repeat activation carries an updated analog value.
    pub fn activate_with_value<I: Input + ?Sized>(&self, input: &I, value: f64) {
        let input = AnyInput::from_input(input);
        let mut inner = self.shared.lock();
        self.activate_locked(&mut inner, input, value);
    }

    fn activate_locked(&self, inner: &mut ControllerInner, input: AnyInput, value: f64) {
        trace!("{} activate {:?} = {}", self.shared.id, input, value);
        inner.activated.insert(input.clone(), value);

        for (receiver, mapping) in inner.live_receivers() {
            let Some(mapped) = map_input(&mapping, &input) else {
                continue;
            };
            let sustained = inner
                .sustained
                .iter()
                .any(|held| map_input(&mapping, held).as_ref() == Some(&mapped));
            receiver.did_activate(ActivationEvent {
                controller: self.shared.id,
                input: &mapped,
                value,
                sustained,
            });
        }
    }

    /// Release `input`.
    ///
    /// No-op when the input is not active or is sustained. A receiver is told
    /// about the release only once no other active input maps to the same target.
    pub fn deactivate<I: Input + ?Sized>(&self, input: &I) {
        let input = AnyInput::from_input(input);
        let mut inner = self.shared.lock();
        if inner.sustained.contains(&input) {
            return;
        }
        self.deactivate_locked(&mut inner, &input);
    }

    fn deactivate_locked(&self, inner: &mut ControllerInner, input: &AnyInput) {
        if inner.activated.remove(input).is_none() {
            return;
        }
        trace!("{} deactivate {:?}", self.shared.id, input);

        for (receiver, mapping) in inner.live_receivers() {
            let Some(mapped) = map_input(&mapping, input) else {
                continue;
            };
            let still_held = inner
                .activated
                .keys()
                .any(|other| map_input(&mapping, other).as_ref() == Some(&mapped));
            if !still_held {
                receiver.did_deactivate(self.shared.id, &mapped);
            }
        }
    }

    /// Hold `input` active until [`unsustain`](Self::unsustain), activating it first if needed
    pub fn sustain<I: Input + ?Sized>(&self, input: &I) {
        let input = AnyInput::from_input(input);
        let mut inner = self.shared.lock();
        if !inner.activated.contains_key(&input) {
            self.activate_locked(&mut inner, input.clone(), 1.0);
        }
        inner.sustained.insert(input);
    }

    pub fn unsustain<I: Input + ?Sized>(&self, input: &I) {
        let input = AnyInput::from_input(input);
        let mut inner = self.shared.lock();
        if inner.sustained.remove(&input) {
            self.deactivate_locked(&mut inner, &input);
        }
    }

    /// Release every sustained input
    pub fn clear_sustained(&self) {
        let mut inner = self.shared.lock();
        let held: Vec<AnyInput> = inner.sustained.drain().collect();
        for input in held {
            self.deactivate_locked(&mut inner, &input);
        }
    }

    pub fn is_activated<I: Input + ?Sized>(&self, input: &I) -> bool {
        let input = AnyInput::from_input(input);
        self.shared.lock().activated.contains_key(&input)
    }

    pub fn activation_value<I: Input + ?Sized>(&self, input: &I) -> Option<f64> {
        let input = AnyInput::from_input(input);
        self.shared.lock().activated.get(&input).copied()
    }

    pub fn activated_inputs(&self) -> Vec<AnyInput> {
        self.shared.lock().activated.keys().cloned().collect()
    }

    pub fn sustained_inputs(&self) -> Vec<AnyInput> {
        self.shared.lock().sustained.iter().cloned().collect()
    }
}

impl fmt::Debug for GameControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameControllerState")
            .field("id", &self.shared.id)
            .field("input_type", &self.shared.input_type)
            .finish_non_exhaustive()
    }
}

/// Registration token; dropping it removes the receiver from the controller
#[must_use = "dropping the handle unregisters the receiver"]
pub struct ReceiverHandle {
    controller: Weak<ControllerShared>,
    index: usize,
    generation: u32,
}

impl ReceiverHandle {
    /// False once the registration was removed or the controller dropped
    pub fn is_registered(&self) -> bool {
        let Some(shared) = self.controller.upgrade() else {
            return false;
        };
        let inner = shared.lock();
        inner.slots.get(self.index).is_some_and(|slot| {
            slot.generation == self.generation
                && slot
                    .entry
                    .as_ref()
                    .is_some_and(|entry| entry.receiver.strong_count() > 0)
        })
    }
}

impl Drop for ReceiverHandle {
    fn drop(&mut self) {
        if let Some(shared) = self.controller.upgrade() {
            shared.lock().remove_slot(self.index, self.generation);
        }
    }
}

impl fmt::Debug for ReceiverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverHandle")
            .field("index", &self.index)
            .field("generation", &self.generation)
            .finish()
    }
}

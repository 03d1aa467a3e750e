//! Lightweight simulated IEC 104 station.
//!
//! [`SimulatedStation`] answers general and counter interrogation, clock
//! synchronisation, test and read commands, and applies process commands to
//! its in-memory points. Useful for testing and development without a real
//! outstation.

use rustiec_core::apci::MAX_ASDU_LEN;
use rustiec_core::asdu::{Asdu, AsduParams, ElementGroup, InformationObject, MAX_OBJECTS};
use rustiec_core::element::{InformationElement, QOI_STATION};
use rustiec_core::types::{Cause, Cp24Time2a, Cp56Time2a, Quality, TimeFormat, TimeTag, TypeId};
use rustiec_core::EncodeError;
use rustiec_link::{LinkError, Server, ServerConfig, Session, SessionHandler};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;

const BROADCAST_ADDRESS: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq)]
struct StationPoint {
    type_id: TypeId,
    element: InformationElement,
}

/// A simulated outstation.
#[derive(Debug)]
pub struct SimulatedStation {
    common_address: u16,
    params: AsduParams,
    points: RwLock<BTreeMap<u32, StationPoint>>,
    interrogations: AtomicUsize,
    commands: AtomicUsize,
    clock: Mutex<Option<Cp56Time2a>>,
}

impl SimulatedStation {
    pub fn new(common_address: u16) -> Self {
        Self {
            common_address,
            params: AsduParams::IEC104,
            points: RwLock::new(BTreeMap::new()),
            interrogations: AtomicUsize::new(0),
            commands: AtomicUsize::new(0),
            clock: Mutex::new(None),
        }
    }

    pub fn with_params(mut self, params: AsduParams) -> Self {
        self.params = params;
        self
    }

    pub fn common_address(&self) -> u16 {
        self.common_address
    }

    /// Adds or replaces a point. `type_id` must be a monitor type whose
    /// element shape matches `element`.
    pub fn set_point(
        &self,
        ioa: u32,
        type_id: TypeId,
        element: InformationElement,
    ) -> Result<(), EncodeError> {
        if !type_id.is_monitor() || type_id.element_kind() != element.kind() {
            return Err(EncodeError::ShapeMismatch);
        }
        if ioa > self.params.max_ioa() {
            return Err(EncodeError::ValueOutOfRange);
        }
        self.points.write().insert(ioa, StationPoint { type_id, element });
        Ok(())
    }

    pub fn point(&self, ioa: u32) -> Option<(TypeId, InformationElement)> {
        self.points
            .read()
            .get(&ioa)
            .map(|p| (p.type_id, p.element))
    }

    /// Number of interrogation commands received so far.
    pub fn interrogation_count(&self) -> usize {
        self.interrogations.load(Ordering::Relaxed)
    }

    /// Number of process commands executed so far.
    pub fn command_count(&self) -> usize {
        self.commands.load(Ordering::Relaxed)
    }

    pub fn last_clock_sync(&self) -> Option<Cp56Time2a> {
        *self.clock.lock()
    }

    /// Binds a server whose every connection is answered by this station.
    pub async fn serve(self: &Arc<Self>, config: ServerConfig) -> Result<Server, LinkError> {
        let station = self.clone();
        Server::bind(config, move |_| station.handler()).await
    }

    /// A per-connection handler. Replies are written in order by a task
    /// owned by the handler.
    pub fn handler(self: &Arc<Self>) -> Arc<dyn SessionHandler> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(Session, Vec<Asdu>)>();
        tokio::spawn(async move {
            while let Some((session, replies)) = rx.recv().await {
                for reply in &replies {
                    if let Err(e) = session.send(reply).await {
                        log::debug!("simulator: reply dropped: {e}");
                        break;
                    }
                }
            }
        });
        Arc::new(StationHandler {
            station: self.clone(),
            replies: tx,
        })
    }

    /// Changes a point's value and reports it spontaneously to every
    /// connected client. Returns the number of clients reached.
    pub fn update(
        &self,
        server: &Server,
        ioa: u32,
        element: InformationElement,
    ) -> Result<usize, EncodeError> {
        let type_id = self
            .point(ioa)
            .map(|(t, _)| t)
            .ok_or(EncodeError::Message("unknown information object address"))?;
        self.set_point(ioa, type_id, element)?;
        let asdu = Asdu::new(type_id, Cause::Spontaneous, self.common_address)
            .with_object(object(ioa, type_id, element));
        Ok(server.broadcast(&asdu))
    }

    /// Computes the replies to one request, in send order.
    pub fn respond(&self, request: &Asdu) -> Vec<Asdu> {
        if request.common_address != self.common_address
            && request.common_address != BROADCAST_ADDRESS
        {
            return vec![request.mirror(Cause::UnknownCommonAddress, true)];
        }
        let expected_cause = if request.type_id == TypeId::Read {
            Cause::Request
        } else {
            Cause::Activation
        };
        if request.cot.cause != expected_cause {
            return vec![request.mirror(Cause::UnknownCause, true)];
        }

        match request.type_id {
            TypeId::Interrogation => self.interrogate(request),
            TypeId::CounterInterrogation => self.counter_interrogate(request),
            TypeId::ClockSync => {
                if let Some(InformationElement::ClockSync(time)) =
                    request.objects.first().and_then(|o| o.element())
                {
                    *self.clock.lock() = Some(*time);
                }
                vec![request.mirror(Cause::ActivationCon, false)]
            }
            TypeId::Test | TypeId::TestCp56 => vec![request.mirror(Cause::ActivationCon, false)],
            TypeId::Read => self.read(request),
            t if t.is_command() => self.command(request),
            _ => vec![request.mirror(Cause::UnknownTypeId, true)],
        }
    }

    fn interrogate(&self, request: &Asdu) -> Vec<Asdu> {
        self.interrogations.fetch_add(1, Ordering::Relaxed);
        let qualifier = match request.objects.first().and_then(|o| o.element()) {
            Some(InformationElement::Interrogation { qualifier }) => *qualifier,
            _ => return vec![request.mirror(Cause::ActivationCon, true)],
        };
        if qualifier != QOI_STATION {
            return vec![request.mirror(Cause::ActivationCon, true)];
        }
        let mut out = vec![request.mirror(Cause::ActivationCon, false)];
        out.extend(self.batches(Cause::InterrogatedByStation, |_| true));
        out.push(request.mirror(Cause::ActivationTerm, false));
        out
    }

    fn counter_interrogate(&self, request: &Asdu) -> Vec<Asdu> {
        let mut out = vec![request.mirror(Cause::ActivationCon, false)];
        out.extend(self.batches(Cause::RequestByGeneralCounter, |t| {
            t.without_time() == TypeId::IntegratedTotals
        }));
        out.push(request.mirror(Cause::ActivationTerm, false));
        out
    }

    fn read(&self, request: &Asdu) -> Vec<Asdu> {
        let Some(ioa) = request.objects.first().map(|o| o.address) else {
            return vec![request.mirror(Cause::UnknownObjectAddress, true)];
        };
        match self.point(ioa) {
            Some((type_id, element)) => vec![Asdu::new(type_id, Cause::Request, self.common_address)
                .with_object(object(ioa, type_id, element))],
            None => vec![request.mirror(Cause::UnknownObjectAddress, true)],
        }
    }

    fn command(&self, request: &Asdu) -> Vec<Asdu> {
        let Some(target) = request.objects.first() else {
            return vec![request.mirror(Cause::UnknownObjectAddress, true)];
        };
        let Some((type_id, current)) = self.point(target.address) else {
            return vec![request.mirror(Cause::UnknownObjectAddress, true)];
        };
        if type_id.command_for() != Some(request.type_id.without_time()) {
            return vec![request.mirror(Cause::ActivationCon, true)];
        }
        let Some(command) = target.element() else {
            return vec![request.mirror(Cause::ActivationCon, true)];
        };
        if is_select(command) {
            return vec![request.mirror(Cause::ActivationCon, false)];
        }
        let Some(element) = apply(current, command) else {
            return vec![request.mirror(Cause::ActivationCon, true)];
        };
        if self.set_point(target.address, type_id, element).is_err() {
            return vec![request.mirror(Cause::ActivationCon, true)];
        }
        self.commands.fetch_add(1, Ordering::Relaxed);
        vec![
            request.mirror(Cause::ActivationCon, false),
            Asdu::new(type_id, Cause::ReturnInfoRemote, self.common_address)
                .with_object(object(target.address, type_id, element)),
        ]
    }

    /// Points of the matching types, grouped per type and split so each
    /// ASDU fits one frame.
    fn batches(&self, cause: Cause, wanted: impl Fn(TypeId) -> bool) -> Vec<Asdu> {
        let points = self.points.read();
        let mut by_type: BTreeMap<u8, Vec<(u32, StationPoint)>> = BTreeMap::new();
        for (ioa, point) in points.iter().filter(|(_, p)| wanted(p.type_id)) {
            by_type
                .entry(point.type_id.to_u8())
                .or_default()
                .push((*ioa, *point));
        }

        let mut out = Vec::new();
        for group in by_type.values() {
            let type_id = group[0].1.type_id;
            let per_asdu = ((MAX_ASDU_LEN - self.params.header_len())
                / self.params.object_len(type_id))
            .clamp(1, MAX_OBJECTS);
            for chunk in group.chunks(per_asdu) {
                let mut asdu = Asdu::new(type_id, cause, self.common_address);
                for (ioa, point) in chunk {
                    asdu.push(object(*ioa, type_id, point.element));
                }
                out.push(asdu);
            }
        }
        out
    }
}

struct StationHandler {
    station: Arc<SimulatedStation>,
    replies: mpsc::UnboundedSender<(Session, Vec<Asdu>)>,
}

impl SessionHandler for StationHandler {
    fn on_asdu(&self, session: &Session, asdu: Asdu) {
        log::debug!("simulator: {} cause {:?}", asdu.type_id, asdu.cot.cause);
        let replies = self.station.respond(&asdu);
        if !replies.is_empty() {
            let _ = self.replies.send((session.clone(), replies));
        }
    }
}

fn object(ioa: u32, type_id: TypeId, element: InformationElement) -> InformationObject {
    InformationObject {
        address: ioa,
        groups: vec![ElementGroup {
            element,
            time: time_tag(type_id.time_format()),
        }],
    }
}

fn time_tag(format: TimeFormat) -> Option<TimeTag> {
    let now = Cp56Time2a::from_system_time(SystemTime::now())?;
    match format {
        TimeFormat::None => None,
        TimeFormat::Cp24 => Some(TimeTag::Cp24(Cp24Time2a {
            millisecond: now.millisecond,
            minute: now.minute,
            invalid: false,
        })),
        TimeFormat::Cp56 => Some(TimeTag::Cp56(now)),
    }
}

fn is_select(command: &InformationElement) -> bool {
    use InformationElement as E;
    matches!(
        command,
        E::SingleCommand { select: true, .. }
            | E::DoubleCommand { select: true, .. }
            | E::RegulatingStep { select: true, .. }
            | E::SetpointNormalized { select: true, .. }
            | E::SetpointScaled { select: true, .. }
            | E::SetpointFloat { select: true, .. }
    )
}

/// The monitor element a point holds after `command` executes.
fn apply(current: InformationElement, command: &InformationElement) -> Option<InformationElement> {
    use InformationElement as E;
    let quality = Quality::GOOD;
    Some(match (current, *command) {
        (E::SinglePoint { .. }, E::SingleCommand { value, .. }) => E::SinglePoint { value, quality },
        (E::DoublePoint { .. }, E::DoubleCommand { value, .. }) => E::DoublePoint { value, quality },
        (E::StepPosition { value, .. }, E::RegulatingStep { step, .. }) => {
            let delta = match step {
                1 => -1,
                2 => 1,
                _ => return None,
            };
            E::StepPosition {
                value: (value + delta).clamp(-64, 63),
                transient: false,
                quality,
            }
        }
        (E::Bitstring { .. }, E::BitstringCommand(value)) => E::Bitstring { value, quality },
        (E::Normalized { .. }, E::SetpointNormalized { value, .. }) => {
            E::Normalized { value, quality }
        }
        (E::NormalizedNoQuality(_), E::SetpointNormalized { value, .. }) => {
            E::NormalizedNoQuality(value)
        }
        (E::Scaled { .. }, E::SetpointScaled { value, .. }) => E::Scaled { value, quality },
        (E::Float { .. }, E::SetpointFloat { value, .. }) => E::Float { value, quality },
        _ => return None,
    })
}

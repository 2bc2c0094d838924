//! The reaction map: which graph traversals a change triggers.
//!
//! The map is written on the *type* graph, keyed by
//! `(entity type, changed field or "*")`. Each rule is a list of
//! traversal steps; a step names one hop (ref, back-ref, parent,
//! children, or all-of-type) and the steps to continue with from the
//! reached entities. Because every hop declares its direction and the
//! nesting is finite, traversal terminates even though the instance
//! graph is cyclic.

use dm_types::EntityType;
use std::collections::HashMap;

/// One hop across the entity graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// Follow forward refs to entities of the type.
    Refs(EntityType),
    /// Follow back-refs from entities of the type.
    BackRefs(EntityType),
    /// Step to the owning parent, when it has the type.
    Parent(EntityType),
    /// Step to all children of the type.
    Children(EntityType),
    /// Every entity of the type (used for process-wide objects such as
    /// flow nodes).
    AllOf(EntityType),
}

/// A traversal step: one hop plus the continuation applied at each
/// reached entity. Reaching a PhysicalRouter marks it dirty; the
/// continuation still runs, so a PR hop may fan out further.
#[derive(Debug, Clone)]
pub struct Step {
    pub hop: Hop,
    pub then: Vec<Step>,
}

impl Step {
    pub fn hop(hop: Hop) -> Self {
        Self {
            hop,
            then: Vec::new(),
        }
    }

    pub fn then(mut self, steps: Vec<Step>) -> Self {
        self.then = steps;
        self
    }
}

/// Rules keyed by `(type, field)`; `"*"` matches any field (and is the
/// fallback when no field-specific rule exists).
#[derive(Debug, Default)]
pub struct ReactionMap {
    rules: HashMap<(EntityType, String), Vec<Step>>,
}

impl ReactionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, entity_type: EntityType, field: &str, steps: Vec<Step>) -> Self {
        self.rules.insert((entity_type, field.to_string()), steps);
        self
    }

    /// Steps to run for an event on `entity_type` naming
    /// `changed_fields`. Field-specific rules take precedence; the
    /// `"*"` rule applies when no named field has one (or the field
    /// list is empty, as for CREATE and DELETE).
    pub fn lookup(&self, entity_type: EntityType, changed_fields: &[String]) -> Vec<&Step> {
        let mut out = Vec::new();
        let mut matched = false;
        for field in changed_fields {
            if let Some(steps) = self.rules.get(&(entity_type, field.clone())) {
                matched = true;
                out.extend(steps.iter());
            }
        }
        if !matched {
            if let Some(steps) = self.rules.get(&(entity_type, "*".to_string())) {
                out.extend(steps.iter());
            }
        }
        out
    }

    /// The standard device-manager reaction map.
    pub fn standard() -> Self {
        use EntityType::*;
        use Hop::*;

        // Common continuations, leaves first.
        let pi_to_pr = || vec![Step::hop(Parent(PhysicalRouter))];
        let vpg_to_pr = || {
            vec![Step::hop(Refs(PhysicalInterface)).then(pi_to_pr())]
        };
        let vmi_fanout = || {
            vec![
                // A VMI change reaches devices through the LR it feeds
                // and through the VPG wiring it to access ports.
                Step::hop(BackRefs(LogicalRouter)).then(vec![Step::hop(Refs(PhysicalRouter))]),
                Step::hop(BackRefs(VirtualPortGroup)).then(vpg_to_pr()),
                Step::hop(BackRefs(LogicalInterface)).then(vec![
                    Step::hop(Parent(PhysicalInterface)).then(pi_to_pr()),
                ]),
            ]
        };
        let vn_fanout = || {
            vec![
                Step::hop(BackRefs(PhysicalRouter)),
                Step::hop(BackRefs(VirtualMachineInterface)).then(vmi_fanout()),
                Step::hop(BackRefs(LogicalRouter)).then(vec![Step::hop(Refs(PhysicalRouter))]),
                Step::hop(BackRefs(Fabric)).then(vec![
                    Step::hop(BackRefs(PhysicalRouter)),
                ]),
            ]
        };
        let lr_fanout = || {
            vec![
                Step::hop(Refs(PhysicalRouter)),
                // Internal-VN and tenant-VN RIs regenerate with the LR.
                Step::hop(Refs(VirtualMachineInterface)).then(vmi_fanout()),
            ]
        };

        Self::new()
            .rule(PhysicalRouter, "*", vec![])
            .rule(
                PhysicalInterface,
                "*",
                vec![
                    Step::hop(Parent(PhysicalRouter)),
                    Step::hop(Refs(PhysicalInterface)).then(pi_to_pr()),
                ],
            )
            .rule(
                LogicalInterface,
                "*",
                vec![Step::hop(Parent(PhysicalInterface)).then(pi_to_pr())],
            )
            .rule(VirtualNetwork, "*", vn_fanout())
            .rule(LogicalRouter, "*", lr_fanout())
            .rule(VirtualMachineInterface, "*", vmi_fanout())
            .rule(VirtualPortGroup, "*", vpg_to_pr())
            .rule(
                Fabric,
                "*",
                vec![Step::hop(BackRefs(PhysicalRouter))],
            )
            .rule(
                NodeProfile,
                "*",
                vec![Step::hop(BackRefs(PhysicalRouter))],
            )
            .rule(
                RoleDefinition,
                "*",
                vec![Step::hop(AllOf(PhysicalRouter))],
            )
            .rule(
                BgpRouter,
                "*",
                vec![
                    Step::hop(BackRefs(PhysicalRouter)),
                    Step::hop(Refs(BgpRouter))
                        .then(vec![Step::hop(BackRefs(PhysicalRouter))]),
                    Step::hop(BackRefs(BgpRouter))
                        .then(vec![Step::hop(BackRefs(PhysicalRouter))]),
                ],
            )
            .rule(
                RoutingInstance,
                "*",
                vec![Step::hop(Parent(VirtualNetwork)).then(vn_fanout())],
            )
            .rule(
                RoutingPolicy,
                "*",
                vec![
                    Step::hop(BackRefs(VirtualNetwork)).then(vn_fanout()),
                    Step::hop(BackRefs(DataCenterInterconnect)).then(vec![
                        Step::hop(Refs(LogicalRouter)).then(lr_fanout()),
                    ]),
                ],
            )
            .rule(
                Bgpvpn,
                "*",
                vec![
                    Step::hop(BackRefs(VirtualNetwork)).then(vn_fanout()),
                    Step::hop(BackRefs(LogicalRouter)).then(lr_fanout()),
                ],
            )
            .rule(
                FloatingIp,
                "*",
                vec![
                    Step::hop(Refs(VirtualMachineInterface)).then(vmi_fanout()),
                    Step::hop(Parent(FloatingIpPool)).then(vec![
                        Step::hop(Parent(VirtualNetwork)).then(vn_fanout()),
                    ]),
                ],
            )
            .rule(
                FloatingIpPool,
                "*",
                vec![Step::hop(Parent(VirtualNetwork)).then(vn_fanout())],
            )
            .rule(
                InstanceIp,
                "*",
                vec![
                    Step::hop(Refs(VirtualMachineInterface)).then(vmi_fanout()),
                    Step::hop(Refs(VirtualNetwork)).then(vn_fanout()),
                ],
            )
            .rule(
                DataCenterInterconnect,
                "*",
                vec![Step::hop(Refs(LogicalRouter)).then(lr_fanout())],
            )
            .rule(
                ServiceInstance,
                "*",
                vec![Step::hop(Children(PortTuple)).then(vec![
                    Step::hop(Refs(LogicalRouter)).then(lr_fanout()),
                ])],
            )
            .rule(
                PortTuple,
                "*",
                vec![Step::hop(Refs(LogicalRouter)).then(lr_fanout())],
            )
            .rule(
                ServiceAppliance,
                "*",
                vec![Step::hop(Refs(PhysicalInterface)).then(pi_to_pr())],
            )
            .rule(
                PortProfile,
                "*",
                vec![
                    Step::hop(BackRefs(VirtualPortGroup)).then(vpg_to_pr()),
                    Step::hop(BackRefs(VirtualMachineInterface)).then(vmi_fanout()),
                ],
            )
            .rule(
                StormControlProfile,
                "*",
                vec![Step::hop(BackRefs(PortProfile)).then(vec![
                    Step::hop(BackRefs(VirtualPortGroup)).then(vpg_to_pr()),
                    Step::hop(BackRefs(VirtualMachineInterface)).then(vmi_fanout()),
                ])],
            )
            .rule(
                TelemetryProfile,
                "*",
                vec![Step::hop(BackRefs(PhysicalRouter))],
            )
            .rule(
                SflowProfile,
                "*",
                vec![Step::hop(BackRefs(TelemetryProfile)).then(vec![
                    Step::hop(BackRefs(PhysicalRouter)),
                ])],
            )
            .rule(
                SecurityGroup,
                "*",
                vec![
                    Step::hop(BackRefs(VirtualMachineInterface)).then(vmi_fanout()),
                    Step::hop(BackRefs(VirtualPortGroup)).then(vpg_to_pr()),
                ],
            )
            .rule(
                InterfaceRouteTable,
                "*",
                vec![Step::hop(BackRefs(VirtualNetwork)).then(vn_fanout())],
            )
            .rule(
                Port,
                "*",
                vec![Step::hop(BackRefs(PhysicalInterface)).then(pi_to_pr())],
            )
            .rule(
                Node,
                "*",
                vec![Step::hop(Children(Port)).then(vec![
                    Step::hop(BackRefs(PhysicalInterface)).then(pi_to_pr()),
                ])],
            )
            .rule(FlowNode, "*", vec![Step::hop(AllOf(PhysicalRouter))])
            .rule(
                GlobalSystemConfig,
                "*",
                vec![Step::hop(AllOf(PhysicalRouter))],
            )
    }
}

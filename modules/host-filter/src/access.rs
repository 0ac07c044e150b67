//! Field accessors over the scan model.
//!
//! Every record type the filter language can reach is a [`Shape`] with a fixed
//! field table. Expressions are type-checked against the tables; evaluation
//! reads through [`Node::get`], which must agree with them.

use scanfmt_core::{
    Distance, Hop, Host, HostAddress, HostName, HostStatus, IpIdSequence, Os, OsClass, OsMatch, OsPortUsed,
    Port, PortService, PortState, Script, TcpSequence, TcpTsSequence, Trace, Uptime,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Host,
    Port,
    PortState,
    PortService,
    Script,
    HostAddress,
    HostName,
    Status,
    Os,
    OsPortUsed,
    OsClass,
    OsMatch,
    Trace,
    Hop,
    Uptime,
    Distance,
    TcpSequence,
    IpIdSequence,
    TcpTsSequence,
}

/// Element type of an array literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elem {
    Bool,
    Num,
    Str,
    /// Empty literal, matches nothing.
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int,
    Float,
    Str,
    /// A list of plain strings, such as CPE identifiers.
    Strings,
    Array(Elem),
    Object(Shape),
    List(Shape),
}

impl Kind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Float)
    }

    pub fn describe(self) -> String {
        match self {
            Kind::Bool => "bool".into(),
            Kind::Int => "int".into(),
            Kind::Float => "float".into(),
            Kind::Str => "string".into(),
            Kind::Strings => "[]string".into(),
            Kind::Array(e) => format!("array of {e:?}").to_lowercase(),
            Kind::Object(s) => s.name().into(),
            Kind::List(s) => format!("[]{}", s.name()),
        }
    }
}

use Kind::{Int, Object, Str, Strings};

impl Shape {
    pub fn name(self) -> &'static str {
        match self {
            Shape::Host => "Host",
            Shape::Port => "Port",
            Shape::PortState => "PortState",
            Shape::PortService => "PortService",
            Shape::Script => "Script",
            Shape::HostAddress => "HostAddress",
            Shape::HostName => "HostName",
            Shape::Status => "Status",
            Shape::Os => "OS",
            Shape::OsPortUsed => "OSPortUsed",
            Shape::OsClass => "OSClass",
            Shape::OsMatch => "OSMatch",
            Shape::Trace => "Trace",
            Shape::Hop => "Hop",
            Shape::Uptime => "Uptime",
            Shape::Distance => "Distance",
            Shape::TcpSequence => "TCPSequence",
            Shape::IpIdSequence => "IPIDSequence",
            Shape::TcpTsSequence => "TCPTSSequence",
        }
    }

    pub fn fields(self) -> &'static [(&'static str, Kind)] {
        match self {
            Shape::Host => &[
                ("StartTime", Int),
                ("EndTime", Int),
                ("Port", Kind::List(Shape::Port)),
                ("HostAddress", Kind::List(Shape::HostAddress)),
                ("HostNames", Kind::List(Shape::HostName)),
                ("Status", Object(Shape::Status)),
                ("OS", Object(Shape::Os)),
                ("Trace", Object(Shape::Trace)),
                ("Uptime", Object(Shape::Uptime)),
                ("Distance", Object(Shape::Distance)),
                ("TCPSequence", Object(Shape::TcpSequence)),
                ("IPIDSequence", Object(Shape::IpIdSequence)),
                ("TCPTSSequence", Object(Shape::TcpTsSequence)),
            ],
            Shape::Port => &[
                ("Protocol", Str),
                ("PortID", Int),
                ("State", Object(Shape::PortState)),
                ("Service", Object(Shape::PortService)),
                ("Script", Kind::List(Shape::Script)),
            ],
            Shape::PortState => &[("State", Str), ("Reason", Str), ("ReasonTTL", Str)],
            Shape::PortService => &[
                ("Name", Str),
                ("Product", Str),
                ("Version", Str),
                ("ExtraInfo", Str),
                ("Method", Str),
                ("Conf", Str),
                ("CPE", Strings),
            ],
            Shape::Script => &[("ID", Str), ("Output", Str)],
            Shape::HostAddress => &[("Address", Str), ("AddressType", Str), ("Vendor", Str)],
            Shape::HostName => &[("Name", Str), ("Type", Str)],
            Shape::Status => &[("State", Str), ("Reason", Str)],
            Shape::Os => &[
                ("OSPortUsed", Kind::List(Shape::OsPortUsed)),
                ("OSClass", Kind::List(Shape::OsClass)),
                ("OSMatch", Kind::List(Shape::OsMatch)),
            ],
            Shape::OsPortUsed => &[("State", Str), ("Protocol", Str), ("PortID", Int)],
            Shape::OsClass => &[
                ("Type", Str),
                ("Vendor", Str),
                ("OSFamily", Str),
                ("OSGen", Str),
                ("Accuracy", Str),
                ("CPE", Strings),
            ],
            Shape::OsMatch => &[("Name", Str), ("Accuracy", Str), ("Line", Str)],
            Shape::Trace => &[("Port", Str), ("Protocol", Str), ("Hops", Kind::List(Shape::Hop))],
            Shape::Hop => &[("TTL", Str), ("IPAddr", Str), ("RTT", Str), ("Host", Str)],
            Shape::Uptime => &[("Seconds", Str), ("LastBoot", Str)],
            Shape::Distance => &[("Value", Str)],
            Shape::TcpSequence => &[("Index", Str), ("Difficulty", Str), ("Values", Str)],
            Shape::IpIdSequence | Shape::TcpTsSequence => &[("Class", Str), ("Values", Str)],
        }
    }

    /// Case-sensitive field lookup.
    pub fn field(self, name: &str) -> Option<(&'static str, Kind)> {
        self.fields().iter().copied().find(|(n, _)| *n == name)
    }
}

/// A borrowed record of any reachable shape.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Host(&'a Host),
    Port(&'a Port),
    PortState(&'a PortState),
    PortService(&'a PortService),
    Script(&'a Script),
    HostAddress(&'a HostAddress),
    HostName(&'a HostName),
    Status(&'a HostStatus),
    Os(&'a Os),
    OsPortUsed(&'a OsPortUsed),
    OsClass(&'a OsClass),
    OsMatch(&'a OsMatch),
    Trace(&'a Trace),
    Hop(&'a Hop),
    Uptime(&'a Uptime),
    Distance(&'a Distance),
    TcpSequence(&'a TcpSequence),
    IpIdSequence(&'a IpIdSequence),
    TcpTsSequence(&'a TcpTsSequence),
}

#[derive(Debug, Clone)]
pub enum Value<'a> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'a str),
    Strings(&'a [String]),
    Array(Vec<Value<'a>>),
    Object(Node<'a>),
    List(Vec<Node<'a>>),
}

fn list<'a, T>(items: &'a [T], wrap: fn(&'a T) -> Node<'a>) -> Value<'a> {
    Value::List(items.iter().map(wrap).collect())
}

impl<'a> Node<'a> {
    pub fn shape(&self) -> Shape {
        match self {
            Node::Host(_) => Shape::Host,
            Node::Port(_) => Shape::Port,
            Node::PortState(_) => Shape::PortState,
            Node::PortService(_) => Shape::PortService,
            Node::Script(_) => Shape::Script,
            Node::HostAddress(_) => Shape::HostAddress,
            Node::HostName(_) => Shape::HostName,
            Node::Status(_) => Shape::Status,
            Node::Os(_) => Shape::Os,
            Node::OsPortUsed(_) => Shape::OsPortUsed,
            Node::OsClass(_) => Shape::OsClass,
            Node::OsMatch(_) => Shape::OsMatch,
            Node::Trace(_) => Shape::Trace,
            Node::Hop(_) => Shape::Hop,
            Node::Uptime(_) => Shape::Uptime,
            Node::Distance(_) => Shape::Distance,
            Node::TcpSequence(_) => Shape::TcpSequence,
            Node::IpIdSequence(_) => Shape::IpIdSequence,
            Node::TcpTsSequence(_) => Shape::TcpTsSequence,
        }
    }

    pub fn get(&self, field: &str) -> Option<Value<'a>> {
        use Value::Str as S;
        let v = match (*self, field) {
            (Node::Host(h), "StartTime") => Value::Int(h.start_time),
            (Node::Host(h), "EndTime") => Value::Int(h.end_time),
            (Node::Host(h), "Port") => list(&h.ports, Node::Port),
            (Node::Host(h), "HostAddress") => list(&h.addresses, Node::HostAddress),
            (Node::Host(h), "HostNames") => list(&h.host_names, Node::HostName),
            (Node::Host(h), "Status") => Value::Object(Node::Status(&h.status)),
            (Node::Host(h), "OS") => Value::Object(Node::Os(&h.os)),
            (Node::Host(h), "Trace") => Value::Object(Node::Trace(&h.trace)),
            (Node::Host(h), "Uptime") => Value::Object(Node::Uptime(&h.uptime)),
            (Node::Host(h), "Distance") => Value::Object(Node::Distance(&h.distance)),
            (Node::Host(h), "TCPSequence") => Value::Object(Node::TcpSequence(&h.tcp_sequence)),
            (Node::Host(h), "IPIDSequence") => Value::Object(Node::IpIdSequence(&h.ip_id_sequence)),
            (Node::Host(h), "TCPTSSequence") => Value::Object(Node::TcpTsSequence(&h.tcp_ts_sequence)),

            (Node::Port(p), "Protocol") => S(&p.protocol),
            (Node::Port(p), "PortID") => Value::Int(i64::from(p.port_id)),
            (Node::Port(p), "State") => Value::Object(Node::PortState(&p.state)),
            (Node::Port(p), "Service") => Value::Object(Node::PortService(&p.service)),
            (Node::Port(p), "Script") => list(&p.scripts, Node::Script),

            (Node::PortState(s), "State") => S(&s.state),
            (Node::PortState(s), "Reason") => S(&s.reason),
            (Node::PortState(s), "ReasonTTL") => S(&s.reason_ttl),

            (Node::PortService(s), "Name") => S(&s.name),
            (Node::PortService(s), "Product") => S(&s.product),
            (Node::PortService(s), "Version") => S(&s.version),
            (Node::PortService(s), "ExtraInfo") => S(&s.extra_info),
            (Node::PortService(s), "Method") => S(&s.method),
            (Node::PortService(s), "Conf") => S(&s.conf),
            (Node::PortService(s), "CPE") => Value::Strings(&s.cpe),

            (Node::Script(s), "ID") => S(&s.id),
            (Node::Script(s), "Output") => S(&s.output),

            (Node::HostAddress(a), "Address") => S(&a.address),
            (Node::HostAddress(a), "AddressType") => S(&a.address_type),
            (Node::HostAddress(a), "Vendor") => S(&a.vendor),

            (Node::HostName(n), "Name") => S(&n.name),
            (Node::HostName(n), "Type") => S(&n.record_type),

            (Node::Status(s), "State") => S(&s.state),
            (Node::Status(s), "Reason") => S(&s.reason),

            (Node::Os(o), "OSPortUsed") => list(&o.port_used, Node::OsPortUsed),
            (Node::Os(o), "OSClass") => list(&o.classes, Node::OsClass),
            (Node::Os(o), "OSMatch") => list(&o.matches, Node::OsMatch),

            (Node::OsPortUsed(p), "State") => S(&p.state),
            (Node::OsPortUsed(p), "Protocol") => S(&p.protocol),
            (Node::OsPortUsed(p), "PortID") => Value::Int(i64::from(p.port_id)),

            (Node::OsClass(c), "Type") => S(&c.class_type),
            (Node::OsClass(c), "Vendor") => S(&c.vendor),
            (Node::OsClass(c), "OSFamily") => S(&c.os_family),
            (Node::OsClass(c), "OSGen") => S(&c.os_gen),
            (Node::OsClass(c), "Accuracy") => S(&c.accuracy),
            (Node::OsClass(c), "CPE") => Value::Strings(&c.cpe),

            (Node::OsMatch(m), "Name") => S(&m.name),
            (Node::OsMatch(m), "Accuracy") => S(&m.accuracy),
            (Node::OsMatch(m), "Line") => S(&m.line),

            (Node::Trace(t), "Port") => S(&t.port),
            (Node::Trace(t), "Protocol") => S(&t.protocol),
            (Node::Trace(t), "Hops") => list(&t.hops, Node::Hop),

            (Node::Hop(h), "TTL") => S(&h.ttl),
            (Node::Hop(h), "IPAddr") => S(&h.ip_addr),
            (Node::Hop(h), "RTT") => S(&h.rtt),
            (Node::Hop(h), "Host") => S(&h.host),

            (Node::Uptime(u), "Seconds") => S(&u.seconds),
            (Node::Uptime(u), "LastBoot") => S(&u.last_boot),

            (Node::Distance(d), "Value") => S(&d.value),

            (Node::TcpSequence(s), "Index") => S(&s.index),
            (Node::TcpSequence(s), "Difficulty") => S(&s.difficulty),
            (Node::TcpSequence(s), "Values") => S(&s.values),

            (Node::IpIdSequence(s), "Class") => S(&s.class),
            (Node::IpIdSequence(s), "Values") => S(&s.values),

            (Node::TcpTsSequence(s), "Class") => S(&s.class),
            (Node::TcpTsSequence(s), "Values") => S(&s.values),

            _ => return None,
        };
        Some(v)
    }
}

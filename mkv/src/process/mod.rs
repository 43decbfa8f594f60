/// Content sniffing.
///
/// Provides [`probe`](probe::probe), scoring how likely a buffer starts a
/// Matroska or WebM file.
pub mod probe;

/// Header parsing and packet delivery.
///
/// Provides the [`Demuxer`](demux::Demuxer), which reads the document up to
/// the first Cluster and then hands out [`Packet`](crate::structs::packet::Packet)s
/// one at a time.
pub mod demux;

/// Cluster, BlockGroup and SimpleBlock assembly into packets.
pub(crate) mod cluster;

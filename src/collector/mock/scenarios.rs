//! Sample outputs of the Slurm tools.
//!
//! These mirror what a small cluster prints so tests can run realistic
//! parse and fetch paths.

/// `scontrol show node --detail --all --oneliner` for four nodes.
pub const NODES_ONELINER: &str = "\
NodeName=linux1 Arch=x86_64 CoresPerSocket=16 CPUAlloc=8 CPUEfctv=64 CPUTot=64 CPULoad=7.93 AvailableFeatures=avx2 ActiveFeatures=avx2 Gres=(null) NodeAddr=linux1 NodeHostName=linux1 RealMemory=257000 AllocMem=32000 FreeMem=190000 Sockets=2 Boards=1 State=MIXED ThreadsPerCore=1 TmpDisk=0 Weight=1 Owner=N/A MCS_label=N/A Partitions=general,physics BootTime=2025-02-20T08:00:00 SlurmdStartTime=2025-02-20T08:01:00 CfgTRES=cpu=64,mem=257000M,billing=64 AllocTRES=cpu=8,mem=32000M CurrentWatts=0 AveWatts=0
NodeName=linux2 Arch=x86_64 CoresPerSocket=16 CPUAlloc=0 CPUEfctv=64 CPUTot=64 CPULoad=0.01 AvailableFeatures=avx2 ActiveFeatures=avx2 Gres=(null) NodeAddr=linux2 NodeHostName=linux2 RealMemory=257000 AllocMem=0 FreeMem=250000 Sockets=2 Boards=1 State=IDLE+DRAIN ThreadsPerCore=1 TmpDisk=0 Weight=1 Owner=N/A MCS_label=N/A Partitions=chemistry BootTime=2025-02-20T08:00:00 SlurmdStartTime=2025-02-20T08:01:00 CfgTRES=cpu=64,mem=257000M,billing=64 AllocTRES= CurrentWatts=0 AveWatts=0 Reason=Kill task failed [root@2025-03-01T10:00:00]
NodeName=linux3 Arch=x86_64 CoresPerSocket=16 CPUAlloc=64 CPUEfctv=64 CPUTot=64 CPULoad=63.91 AvailableFeatures=avx2 ActiveFeatures=avx2 Gres=(null) NodeAddr=linux3 NodeHostName=linux3 RealMemory=257000 AllocMem=250000 FreeMem=4000 Sockets=2 Boards=1 State=ALLOCATED ThreadsPerCore=1 TmpDisk=0 Weight=1 Owner=N/A MCS_label=N/A Partitions=physics BootTime=2025-02-20T08:00:00 SlurmdStartTime=2025-02-20T08:01:00 CfgTRES=cpu=64,mem=257000M,billing=64 AllocTRES=cpu=64,mem=250000M CurrentWatts=0 AveWatts=0
NodeName=gpu1 Arch=x86_64 CoresPerSocket=32 CPUAlloc=0 CPUEfctv=64 CPUTot=64 CPULoad=0.00 AvailableFeatures=a100 ActiveFeatures=a100 Gres=gpu:a100:4 NodeAddr=gpu1 NodeHostName=gpu1 RealMemory=515000 AllocMem=0 FreeMem=500000 Sockets=2 Boards=1 State=DOWN+NOT_RESPONDING ThreadsPerCore=1 TmpDisk=0 Weight=10 Owner=N/A MCS_label=N/A Partitions=gpu BootTime=None SlurmdStartTime=None CfgTRES=cpu=64,mem=515000M,billing=64,gres/gpu=4 AllocTRES= CurrentWatts=0 AveWatts=0 Reason=Not responding: gres=gpu:a100:4 missing [slurm@2025-03-02T07:12:44]
";

/// `scontrol show job --detail --all --oneliner` for three jobs.
pub const JOBS_ONELINER: &str = "\
JobId=6833 JobName=train_resnet UserId=alice(1001) GroupId=ml(2001) Priority=4294 Nice=0 Account=ml QOS=normal JobState=RUNNING Reason=None Dependency=(null) RunTime=01:02:03 TimeLimit=1-00:00:00 SubmitTime=2025-03-01T09:00:00 StartTime=2025-03-01T09:00:05 Partition=gpu NodeList=gpu1 NumNodes=1 NumCPUs=16 Mem=64G Command=/home/alice/train.sh --epochs 90
JobId=6834 JobName=md_sim UserId=bob(1002) GroupId=chem(2002) Priority=4100 Nice=0 Account=chem QOS=normal JobState=PENDING Reason=Resources Dependency=(null) RunTime=00:00:00 TimeLimit=02:00:00 SubmitTime=2025-03-01T09:10:00 StartTime=Unknown Partition=chemistry NodeList=(null) NumNodes=2 NumCPUs=128 Mem=200G Command=/home/bob/run_md.sh
JobId=6835 JobName=lattice UserId=carol(1003) GroupId=phys(2003) Priority=3900 Nice=0 Account=phys QOS=long JobState=RUNNING Reason=None Dependency=(null) RunTime=10:00:00 TimeLimit=3-00:00:00 SubmitTime=2025-02-28T23:00:00 StartTime=2025-02-28T23:00:01 Partition=physics NodeList=linux3 NumNodes=1 NumCPUs=64 Mem=250000M Command=/home/carol/lattice
";

/// `scontrol show partitions --detail --all --oneliner`.
pub const PARTITIONS_ONELINER: &str = "\
PartitionName=general AllowGroups=ALL Default=YES State=UP TotalCPUs=128 TotalNodes=2
PartitionName=chemistry AllowGroups=ALL Default=NO State=UP TotalCPUs=64 TotalNodes=1
PartitionName=physics AllowGroups=ALL Default=NO State=UP TotalCPUs=128 TotalNodes=2
PartitionName=gpu AllowGroups=ALL Default=NO State=UP TotalCPUs=64 TotalNodes=1
";

/// Excerpt of `sdiag` output.
pub const SDIAG_OUTPUT: &str = "\
*******************************************************
sdiag output at Sat Mar 01 10:00:00 2025 (1740823200)
Data since      Sat Mar 01 00:00:00 2025 (1740787200)
*******************************************************
Server thread count:  3
Agent queue size:     0
Jobs submitted: 1204
Jobs started:   1187

Main schedule statistics (microseconds):
\tLast cycle:   1532
\tMax cycle:    18044

Backfilling stats
\tTotal backfilled jobs (since last slurm start): 412
";

/// Excerpt of `scontrol show config`.
pub const SHOW_CONFIG: &str = "\
Configuration data as of 2025-03-01T10:00:00
AccountingStorageType   = accounting_storage/slurmdbd
ClusterName             = hpc-east
SlurmctldHost[0]        = head01(10.0.0.1)
SlurmctldHost[1]        = head02(10.0.0.2)
SLURM_VERSION           = 24.11.3
";

/// `sacctmgr show Account --parsable2`.
pub const SACCTMGR_ACCOUNTS: &str = "\
Account|Descr|Org
chem|chemistry group|science
ml|machine learning|science
root|default root account|root
";

/// `sacctmgr show User --parsable2`.
pub const SACCTMGR_USERS: &str = "\
User|Def Acct|Def WCKey|Admin
alice|ml||None
bob|chem||None
root|root||Administrator
";

/// `sacct --parsable2` for a first accounting window.
pub const SACCT_WINDOW_1: &str = "\
JobIDRaw|Partition|State|JobName|ReqCPUS|AllocCPUS
1|gpu|RUNNING|train|16|16
2|chemistry|PENDING|md_sim|128|0
";

/// `sacct --parsable2` for a later, overlapping window.
pub const SACCT_WINDOW_2: &str = "\
JobIDRaw|Partition|State|JobName|ReqCPUS|AllocCPUS
2|chemistry|COMPLETED|md_sim|128|128
3|physics|RUNNING|lattice|64|64
";
